use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, FnArg, Ident, ImplItem, ImplItemFn, ItemImpl, LitStr, Pat, Result as SynResult, Type,
};

struct ControllerArgs {
    container_aware: bool,
}

impl Parse for ControllerArgs {
    fn parse(input: ParseStream) -> SynResult<Self> {
        let mut container_aware = false;
        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            match ident.to_string().as_str() {
                "container_aware" => container_aware = true,
                other => return Err(syn::Error::new(ident.span(), format!("unexpected option {}", other))),
            }
            if input.peek(syn::Token![,]) {
                input.parse::<syn::Token![,]>()?;
            }
        }
        Ok(ControllerArgs { container_aware })
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(p) => p.path.segments.last(),
        _ => None,
    }
}

fn is_option(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|seg| seg.ident == "Option")
}

/// Borrowed context types are handed over from the invocation instead of
/// being parsed from the parameter map.
fn context_arg(ty: &Type) -> Option<TokenStream2> {
    let Type::Reference(r) = ty else { return None };
    let seg = last_segment(&r.elem)?;
    match seg.ident.to_string().as_str() {
        "Invocation" => Some(quote! { invocation }),
        "Resolver" => Some(quote! { invocation.resolver() }),
        "Params" => Some(quote! { invocation.params() }),
        "Container" => Some(quote! { invocation.app() }),
        _ => None,
    }
}

/// `#[action("notFound")]` renames the action a method answers to.
fn take_action_name(method: &mut ImplItemFn) -> SynResult<String> {
    let mut name = method.sig.ident.to_string();
    let mut kept = Vec::with_capacity(method.attrs.len());
    for attr in method.attrs.drain(..) {
        if attr.path().is_ident("action") {
            let lit: LitStr = attr.parse_args()?;
            name = lit.value();
        } else {
            kept.push(attr);
        }
    }
    method.attrs = kept;
    Ok(name)
}

fn action_arm(method: &ImplItemFn, action: &str) -> SynResult<TokenStream2> {
    let ident = &method.sig.ident;
    let mut bindings = Vec::new();
    let mut args = Vec::new();
    for input in method.sig.inputs.iter().skip(1) {
        let FnArg::Typed(pat_type) = input else { continue };
        let Pat::Ident(pat) = pat_type.pat.as_ref() else {
            return Err(syn::Error::new_spanned(&pat_type.pat, "action arguments must be plain identifiers"));
        };
        let arg = &pat.ident;
        let ty = &pat_type.ty;
        if let Some(context) = context_arg(ty) {
            args.push(context);
            continue;
        }
        let name = arg.to_string();
        let name = name.trim_start_matches("r#");
        if is_option(ty) {
            bindings.push(quote! { let #arg: #ty = invocation.param_opt(#name)?; });
        } else {
            bindings.push(quote! { let #arg: #ty = invocation.param(#name)?; });
        }
        args.push(quote! { #arg });
    }
    Ok(quote! {
        #action => {
            #(#bindings)*
            ::mvcore::ActionOutput::into_dispatch_result(self.#ident(#(#args),*))
        }
    })
}

/// Turn an inherent `impl` block into a resolvable handler class.
///
/// Every method taking `&self` becomes an action named after the method
/// (or after its `#[action("...")]` attribute). Arguments are filled from
/// the invocation parameters by name and parsed with `FromStr`; `Option<T>`
/// arguments may be absent. Arguments of type `&Invocation`, `&Resolver`,
/// `&Params` or `&Container` receive the invocation context instead.
/// Actions return `()` or `Result<(), E>` with `E: Into<DispatchError>`.
///
/// `#[controller(container_aware)]` also reports the
/// `ContainerAware` capability, which the type must implement.
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ControllerArgs);
    let mut input = parse_macro_input!(item as ItemImpl);

    if input.trait_.is_some() {
        return syn::Error::new_spanned(&input.self_ty, "#[controller] expects an inherent impl block")
            .to_compile_error()
            .into();
    }

    let mut arms = Vec::new();
    for item in input.items.iter_mut() {
        let ImplItem::Fn(method) = item else { continue };
        let takes_shared_self = matches!(
            method.sig.inputs.first(),
            Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none()
        );
        if !takes_shared_self {
            continue;
        }
        let arm = take_action_name(method).and_then(|action| action_arm(method, &action));
        match arm {
            Ok(arm) => arms.push(arm),
            Err(e) => return e.to_compile_error().into(),
        }
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    let aware = if args.container_aware {
        quote! {
            fn container_aware(&mut self) -> ::std::option::Option<&mut dyn ::mvcore::ContainerAware> {
                ::std::option::Option::Some(self)
            }
        }
    } else {
        quote! {}
    };

    let expanded = quote! {
        #input

        impl #impl_generics ::mvcore::Handler for #self_ty #where_clause {
            fn call(&self, invocation: &::mvcore::Invocation<'_>) -> ::mvcore::DispatchResult {
                match invocation.action() {
                    #(#arms)*
                    _ => ::std::result::Result::Err(invocation.unknown_action()),
                }
            }

            #aware
        }
    };
    TokenStream::from(expanded)
}

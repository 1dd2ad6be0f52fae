use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{FnArg, Ident, ItemFn, LitStr, Pat};

/// Proc macro to denote a Transaction
///
/// A transaction is a single timed request whose `Result` decides whether its check passes. The
/// check is named after the function unless a name is given.
///
/// NOTE: Currently this macro only works on functions with a `Result<T, E>` return value.
///
/// # Example
/// ```ignore
/// use shopstress::prelude::*;
///
/// #[transaction("auth")]
/// async fn login(client: &Client, username: &str) -> Result<Token, ShopError> {
///     ...
/// }
/// ```
#[proc_macro_attribute]
pub fn transaction(attr: TokenStream, item: TokenStream) -> TokenStream {
    match transaction_internal(attr, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn transaction_internal(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream2> {
    let input = syn::parse::<ItemFn>(item)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;
    let stmts = &block.stmts;

    let name = if attr.is_empty() {
        LitStr::new(&sig.ident.to_string(), sig.ident.span())
    } else {
        syn::parse::<LitStr>(attr)?
    };

    Ok(quote! {
        #(#attrs)* #vis #sig {
            ::shopstress::transaction::transaction_hook(
                ::shopstress::core::generate_labels!(#name),
                async move {
                    #(#stmts)*
                },
            ).await
        }
    })
}

/// Proc macro to denote a Scenario
///
/// The annotated async function is one iteration of a virtual user. Arguments are cloned into
/// every iteration, so they must be `Clone + Send + Sync + 'static` (typically an `Arc`). The
/// function returns no value.
///
/// See the `Scenario` struct for more information on the methods this macro provides on functions.
///
/// # Example
/// ```ignore
/// use shopstress::prelude::*;
///
/// #[scenario]
/// async fn my_scenario(ctx: Arc<Context>) {
/// }
/// ```
#[proc_macro_attribute]
pub fn scenario(attr: TokenStream, item: TokenStream) -> TokenStream {
    match scenario_internal(attr, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn scenario_internal(_attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream2> {
    let input = syn::parse::<ItemFn>(item)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;
    let stmts = &block.stmts;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[scenario] must be placed on an async fn",
        ));
    }

    let mut args = vec![];
    for input in &sig.inputs {
        match input {
            FnArg::Typed(pat_type) => match &*pat_type.pat {
                Pat::Ident(pat) => args.push(pat.ident.clone()),
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "#[scenario] arguments must be plain identifiers",
                    ))
                }
            },
            FnArg::Receiver(recv) => {
                return Err(syn::Error::new_spanned(
                    recv,
                    "#[scenario] cannot be placed on methods",
                ))
            }
        }
    }

    let new_name = Ident::new(&format!("__shopstress_{}", sig.ident), Span::call_site());
    let mut new_sig = sig.clone();
    new_sig.ident = new_name.clone();

    let mut scen_sig = sig.clone();
    let scen_name = sig.ident.clone();
    scen_sig.asyncness = None;
    scen_sig.output = syn::parse2(quote! {
        -> impl ::shopstress::scenario::ConfigurableScenario<::shopstress::core::RunStatistics>
    })?;

    Ok(quote! {
        #(#attrs)* #vis #scen_sig {
            ::shopstress::scenario::Scenario::new(
                stringify!(#scen_name),
                move || #new_name(#(::std::clone::Clone::clone(&#args)),*),
            )
        }

        #[doc(hidden)]
        #(#attrs)* #vis #new_sig {
            #(#stmts)*
        }
    })
}

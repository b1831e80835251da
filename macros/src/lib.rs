//! Proc macros for the casekit test runner.
//!
//! This crate provides the `#[casekit::test]` and `#[casekit::bench]`
//! attributes for registering free functions as cases, and the
//! `casekit::main!()` macro generating a `main` that runs them.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::{parse_macro_input, ItemFn, LitInt, LitStr};

/// Register a function as a test case.
///
/// The function takes `&mut casekit::Context` and returns `casekit::Outcome`.
/// Cases are numbered in the order they appear in the source.
///
/// # Example
///
/// ```rust,ignore
/// use casekit::{compare, Context, Outcome};
///
/// #[casekit::test]
/// fn splits_on_comma(ctx: &mut Context) -> Outcome {
///     let parts: Vec<_> = "a,b".split(',').collect();
///     compare!(ctx, parts, ["a", "b"]);
///     Ok(())
/// }
/// ```
///
/// # Attributes
///
/// - `#[casekit::test]` - Run once
/// - `#[casekit::test(repeat = 10)]` - Run 10 times in a row
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut repeat = 1usize;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("repeat") {
            repeat = parse_repeat(&meta)?;
            Ok(())
        } else {
            Err(meta.error("expected `repeat = N`"))
        }
    });
    parse_macro_input!(attr with parser);

    let input = parse_macro_input!(item as ItemFn);
    register(input, quote!(::casekit::CaseKind::Test), repeat).into()
}

/// Register a function as a benchmark.
///
/// Without a timer argument the benchmark is measured with whatever the run
/// selects through `--benchmark`.
///
/// # Attributes
///
/// - `#[casekit::bench]` - Run's default timer, measured once
/// - `#[casekit::bench(wall_time)]`, `cpu_time`, `cpu_cycles` - Fixed timer
/// - `#[casekit::bench(repeat = 50)]` - Number of measurements
#[proc_macro_attribute]
pub fn bench(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut kind = quote!(DefaultBenchmark);
    let mut repeat = 1usize;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("repeat") {
            repeat = parse_repeat(&meta)?;
        } else if meta.path.is_ident("wall_time") {
            kind = quote!(WallTimeBenchmark);
        } else if meta.path.is_ident("cpu_time") {
            kind = quote!(CpuTimeBenchmark);
        } else if meta.path.is_ident("cpu_cycles") {
            kind = quote!(CpuCyclesBenchmark);
        } else if meta.path.is_ident("default") {
            kind = quote!(DefaultBenchmark);
        } else {
            return Err(meta.error(
                "expected one of `wall_time`, `cpu_time`, `cpu_cycles`, `default` or `repeat = N`",
            ));
        }
        Ok(())
    });
    parse_macro_input!(attr with parser);

    let input = parse_macro_input!(item as ItemFn);
    register(input, quote!(::casekit::CaseKind::#kind), repeat).into()
}

fn parse_repeat(meta: &ParseNestedMeta<'_>) -> syn::Result<usize> {
    let lit: LitInt = meta.value()?.parse()?;
    let repeat: usize = lit.base10_parse()?;
    if repeat == 0 {
        return Err(syn::Error::new_spanned(lit, "repeat count must be at least 1"));
    }
    Ok(repeat)
}

fn register(input: ItemFn, kind: TokenStream2, repeat: usize) -> TokenStream2 {
    let sig = &input.sig;
    if sig.inputs.len() != 1 || !sig.generics.params.is_empty() || sig.asyncness.is_some() {
        return syn::Error::new_spanned(
            sig,
            "casekit cases take a single `&mut casekit::Context` and return `casekit::Outcome`",
        )
        .to_compile_error();
    }

    let fn_name = &sig.ident;
    let fn_name_str = fn_name.to_string();
    let wrapper = format_ident!("__casekit_case_{}", fn_name);
    let entry = format_ident!("__CASEKIT_CASE_{}", fn_name_str.to_uppercase());

    quote! {
        #input

        #[doc(hidden)]
        fn #wrapper(_: &mut (), ctx: &mut ::casekit::Context) -> ::casekit::Outcome {
            #fn_name(ctx)
        }

        #[allow(non_upper_case_globals)]
        #[::casekit::__private::linkme::distributed_slice(::casekit::__private::CASEKIT_CASES)]
        #[linkme(crate = ::casekit::__private::linkme)]
        static #entry: ::casekit::__private::DiscoveredCase = ::casekit::__private::DiscoveredCase {
            name: #fn_name_str,
            kind: #kind,
            repeat: #repeat,
            func: #wrapper,
            file: ::core::file!(),
            line: ::core::line!(),
        };
    }
}

/// Generate the `main` function of a test binary.
///
/// Place this at the end of a file with `#[casekit::test]` and
/// `#[casekit::bench]` cases. The suite is named after the crate unless a
/// name is given.
///
/// # Example
///
/// ```rust,ignore
/// casekit::main!();
/// casekit::main!("ParserTest");
/// ```
#[proc_macro]
pub fn casekit_main(input: TokenStream) -> TokenStream {
    let name = if input.is_empty() {
        quote!(::core::env!("CARGO_CRATE_NAME"))
    } else {
        let lit = parse_macro_input!(input as LitStr);
        quote!(#lit)
    };

    let expanded = quote! {
        fn main() -> ::std::process::ExitCode {
            ::casekit::run_discovered(#name)
        }
    };
    TokenStream::from(expanded)
}

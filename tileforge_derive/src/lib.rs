//! Attribute macros shared by the tileforge crates.
//!
//! [`macro@context`] wraps a function returning `anyhow::Result` so that every error it
//! returns carries an additional context message. Function arguments can be referenced in
//! the message, which is only formatted when an error occurs:
//!
//! ```ignore
//! #[context("Failed to read tile {tile}")]
//! fn read(&self, tile: &Tile) -> Result<Data> { ... }
//! ```

mod args;

use crate::args::ContextArgs;
use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use quote::{ToTokens, quote};
use syn::{ItemFn, ReturnType, Type, parse_macro_input};

#[proc_macro_attribute]
pub fn context(args: TokenStream, input: TokenStream) -> TokenStream {
	let args = parse_macro_input!(args as ContextArgs);
	let mut function = parse_macro_input!(input as ItemFn);

	let return_type = match &function.sig.output {
		ReturnType::Type(_, return_type) => return_type.clone(),
		ReturnType::Default => {
			return syn::Error::new_spanned(&function.sig, "#[context] needs a function returning anyhow::Result")
				.to_compile_error()
				.into();
		}
	};

	let body = if function.sig.asyncness.is_some() {
		wrap_async(&args, &function, &return_type)
	} else {
		wrap_sync(&args, &function, &return_type)
	};
	function.block.stmts = vec![syn::Stmt::Expr(syn::Expr::Verbatim(body), None)];

	function.into_token_stream().into()
}

/// `map_err` adding the formatted message, evaluated only for errors.
fn add_context(args: &ContextArgs) -> TokenStream2 {
	let ContextArgs {
		message, format_args, ..
	} = args;
	let err = Ident::new("err", Span::mixed_site());
	quote! {
		map_err(|#err| ::anyhow::Error::from(#err).context(::std::format!(#message, #format_args)).into())
	}
}

fn wrap_async(args: &ContextArgs, function: &ItemFn, return_type: &Type) -> TokenStream2 {
	let block = &function.block;
	let move_token = &args.move_token;
	let add_context = add_context(args);
	let result = Ident::new("result", Span::mixed_site());
	quote! {
		let #result: #return_type = async #move_token #block.await;
		#result.#add_context
	}
}

fn wrap_sync(args: &ContextArgs, function: &ItemFn, return_type: &Type) -> TokenStream2 {
	let block = &function.block;
	let move_token = &args.move_token;
	let add_context = add_context(args);
	let call_once = Ident::new("call_once", Span::mixed_site());
	// The body runs in a closure so that `return` and `?` stay inside it. Passing it
	// through a `FnOnce` bound lets the body move out of captured arguments.
	quote! {
		fn #call_once<R, F: ::core::ops::FnOnce() -> R>(f: F) -> R {
			f()
		}
		#call_once(#move_token || -> #return_type #block).#add_context
	}
}

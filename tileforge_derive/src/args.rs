use syn::{
	Expr, LitStr, Token,
	parse::{self, Parse, ParseStream},
	punctuated::Punctuated,
};

/// Arguments of `#[context(..)]`.
///
/// ```text
/// #[context("Failed to read tile {tile}")]
/// #[context(move, "Failed to read {} tiles", tiles.len())]
/// ```
///
/// The message must be a string literal; it may be followed by positional format arguments.
#[derive(Debug)]
pub struct ContextArgs {
	pub move_token: Option<Token![move]>,
	pub message: LitStr,
	pub format_args: Punctuated<Expr, Token![,]>,
}

impl Parse for ContextArgs {
	fn parse(input: ParseStream<'_>) -> parse::Result<Self> {
		let move_token = if input.peek(Token![move]) {
			let token = input.parse()?;
			input.parse::<Token![,]>()?;
			Some(token)
		} else {
			None
		};
		if !input.peek(LitStr) {
			return Err(input.error("expected a context message, e.g. \"Failed to read tile {tile}\""));
		}
		let message = input.parse()?;
		let format_args = if input.is_empty() {
			Punctuated::new()
		} else {
			input.parse::<Token![,]>()?;
			Punctuated::parse_terminated(input)?
		};
		Ok(Self {
			move_token,
			message,
			format_args,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::ContextArgs;
	use syn::parse_str;

	#[test]
	fn parses_message_only() {
		let args: ContextArgs = parse_str(r#""tile {tile} failed""#).unwrap();
		assert!(args.move_token.is_none());
		assert_eq!(args.message.value(), "tile {tile} failed");
		assert!(args.format_args.is_empty());
	}

	#[test]
	fn parses_move_and_format_args() {
		let args: ContextArgs = parse_str(r#"move, "zoom {} of {}", tile.zoom(), levels.max,"#).unwrap();
		assert!(args.move_token.is_some());
		assert_eq!(args.message.value(), "zoom {} of {}");
		assert_eq!(args.format_args.len(), 2);
	}

	#[test]
	fn requires_a_message_literal() {
		let err = parse_str::<ContextArgs>("tile").unwrap_err();
		assert!(err.to_string().contains("context message"), "{err}");
		assert!(parse_str::<ContextArgs>(r#"move "tile""#).is_err());
	}
}

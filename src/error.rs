use snafu::{Backtrace, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub")]
pub enum Error {
	/// An error occurred while sending or receiving a HTTP request or response
	/// respectively.
	#[snafu(display("Source: {}\nBacktrace:\n{}", source, backtrace))]
	Http {
		source: reqwest::Error,
		backtrace: Backtrace,
	},

	/// An error occurred while parsing or serializing JSON.
	#[snafu(display("Source: {}\nBacktrace:\n{}", source, backtrace))]
	Json {
		source: serde_json::Error,
		backtrace: Backtrace,
	},

	/// GitHub answered outside the 2xx range.
	#[snafu(display("Status code: {}\nBody:\n{:#?}", status, body))]
	Response {
		status: reqwest::StatusCode,
		body: serde_json::Value,
	},

	/// A field the caller relies on was absent from a payload.
	#[snafu(display("Missing field `{}`", field))]
	MissingField {
		field: String,
		backtrace: Backtrace,
	},

	#[snafu(display("{}", msg))]
	Message { msg: String },

	/// The listener failed to bind or serve.
	#[snafu(display("Source: {}", source))]
	Hyper {
		source: hyper::Error,
		backtrace: Backtrace,
	},
}

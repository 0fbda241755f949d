use serde_json::json;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Client(#[from] autobahn_client::Error),

	#[error("invalid spec file: {0}")]
	SpecFile(#[source] serde_json::Error),

	#[error("interrupted before the run finished")]
	Interrupted,

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn to_command_error(&self) -> CommandError {
		let (code, details) = match self {
			CliError::Client(err) => classify_client_error(err),
			CliError::SpecFile(_) => (ErrorCode::InvalidInput, None),
			CliError::Interrupted => (ErrorCode::InternalError, None),
			CliError::Io(_) => (ErrorCode::IoError, None),
			CliError::Anyhow(err) => {
				let code = if err.root_cause().downcast_ref::<std::io::Error>().is_some() {
					ErrorCode::IoError
				} else {
					ErrorCode::InternalError
				};
				(code, None)
			}
		};

		CommandError {
			code,
			message: format!("{self:#}"),
			details,
		}
	}
}

fn classify_client_error(err: &autobahn_client::Error) -> (ErrorCode, Option<serde_json::Value>) {
	use autobahn_client::Error;

	match err {
		Error::NotConnected | Error::ConnectionLost { .. } => (ErrorCode::ConnectionFailed, None),
		Error::RemoteCall(inner) => match inner.error_uri() {
			Some(uri) => (ErrorCode::RemoteError, Some(json!({ "uri": uri }))),
			None if inner.is_closed() => (ErrorCode::ConnectionFailed, None),
			None => (ErrorCode::InternalError, None),
		},
		Error::MalformedResult { procedure, .. } => {
			(ErrorCode::MalformedResult, Some(json!({ "procedure": procedure })))
		}
		Error::InvalidSpec(_) => (ErrorCode::InvalidSpec, None),
		Error::Config(_) => (ErrorCode::ConfigError, None),
	}
}

#[cfg(test)]
mod tests {
	use autobahn_client::{CloseCode, Error};

	use super::*;

	#[test]
	fn connection_errors_map_to_connection_failed() {
		let err = CliError::from(Error::NotConnected);
		assert_eq!(err.to_command_error().code, ErrorCode::ConnectionFailed);

		let err = CliError::from(Error::ConnectionLost {
			code: CloseCode::Unreachable,
			reason: "could not reach router".into(),
			detail: None,
		});
		assert_eq!(err.to_command_error().code, ErrorCode::ConnectionFailed);
	}

	#[test]
	fn remote_error_carries_uri() {
		let err = CliError::from(Error::RemoteCall(remote_error()));
		let cmd = err.to_command_error();
		assert_eq!(cmd.code, ErrorCode::RemoteError);
		assert_eq!(
			cmd.details,
			Some(json!({"uri": "http://api.testsuite.autobahn.ws/testdb/error#nospec"}))
		);
	}

	fn remote_error() -> ab_runtime::Error {
		ab_runtime::Error::Remote {
			uri: "http://api.testsuite.autobahn.ws/testdb/error#nospec".into(),
			description: "no such spec".into(),
			details: None,
		}
	}

	#[test]
	fn malformed_result_names_procedure() {
		let err = CliError::from(Error::MalformedResult {
			procedure: "testrunner:run".into(),
			reason: "expected [runId, resultIds]".into(),
		});
		let cmd = err.to_command_error();
		assert_eq!(cmd.code, ErrorCode::MalformedResult);
		assert_eq!(cmd.details, Some(json!({"procedure": "testrunner:run"})));
	}

	#[test]
	fn missing_file_is_io_error() {
		let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
		let err = CliError::from(anyhow::Error::new(io).context("cannot read spec file spec.json"));
		let cmd = err.to_command_error();
		assert_eq!(cmd.code, ErrorCode::IoError);
		assert!(cmd.message.contains("cannot read spec file spec.json"), "{}", cmd.message);
		assert!(cmd.message.contains("no such file"), "{}", cmd.message);
	}

	#[test]
	fn config_error_code() {
		let err = CliError::from(Error::Config("invalid config client.json".into()));
		assert_eq!(err.to_command_error().code, ErrorCode::ConfigError);
	}
}

//! I/O handlers: HTTP calls, shell commands, webhook responses.

mod execute_command;
mod http_request;
mod respond_webhook;

pub use execute_command::ExecuteCommand;
pub use http_request::HttpRequest;
pub use respond_webhook::RespondWebhook;

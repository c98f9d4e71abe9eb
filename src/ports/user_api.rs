//! UserAPI port (spec §6). The receptionist-side and expert-side variants
//! are distinguished only by prompt routing, so one trait serves both; the
//! console/chat frontend itself is out of scope (spec §1).

use async_trait::async_trait;

#[async_trait]
pub trait UserApi: Send + Sync {
    /// Blocking (from the caller's perspective) request-response.
    async fn query_user(&self, prompt: &str) -> String;

    /// Fire-and-forget notification to the user.
    async fn message_user(&self, text: &str);
}

/// Console-backed `UserApi` used by the CLI binary when no richer
/// frontend is wired in. Reads a line from stdin per query.
pub struct ConsoleUserApi;

#[async_trait]
impl UserApi for ConsoleUserApi {
    async fn query_user(&self, prompt: &str) -> String {
        println!("{prompt}");
        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err() {
            return String::new();
        }
        input.trim().to_string()
    }

    async fn message_user(&self, text: &str) {
        println!("{text}");
    }
}

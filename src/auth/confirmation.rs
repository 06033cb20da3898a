use async_trait::async_trait;
use rand::Rng;
use tracing::info;

/// Sends a registration confirmation code to the user.
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(&self, user_id: &str, code: &str) -> anyhow::Result<()>;
}

/// Writes codes to the log. Suitable for development only.
#[derive(Debug, Default, Clone)]
pub struct LoggingCodeDelivery;

#[async_trait]
impl CodeDelivery for LoggingCodeDelivery {
    async fn deliver(&self, user_id: &str, code: &str) -> anyhow::Result<()> {
        info!(user_id = %user_id, code = %code, "Confirmation code issued");
        Ok(())
    }
}

/// Six decimal digits, zero padded
pub fn generate_confirmation_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", code)
}

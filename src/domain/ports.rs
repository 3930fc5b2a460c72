use crate::domain::model::ProbeReport;
use crate::utils::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Probe: Send + Sync {
    /// 用於標識探測名稱
    fn name(&self) -> &str;

    async fn run(&self) -> Result<ProbeReport>;
}

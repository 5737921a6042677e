use async_trait::async_trait;
use leadfunnel_core::{Address, ContactRecord, PropertyRecord};

/// A vendor that values a property. `None` means "no data" for any reason.
#[async_trait]
pub trait PropertySource: Send + Sync {
    async fn lookup(&self, address: &Address) -> Option<PropertyRecord>;
}

/// A vendor that skip-traces the owner of a property.
#[async_trait]
pub trait ContactSource: Send + Sync {
    async fn lookup(&self, address: &Address) -> Option<ContactRecord>;
}

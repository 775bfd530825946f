//! Lookup of message types named by `Any` type URLs.

use prost_reflect::{DescriptorPool, MessageDescriptor};

use crate::{Error, Result};

/// Finds message descriptors by full name or type URL.
pub trait TypeResolver: Send + Sync {
    fn find_message_by_name(&self, name: &str) -> Option<MessageDescriptor>;

    /// Resolve a type URL. Only the part after the last `/` is used.
    fn find_message_by_url(&self, url: &str) -> Result<MessageDescriptor> {
        let name = url.rsplit_once('/').map_or(url, |(_, name)| name);
        if name.is_empty() {
            return Err(Error::Unresolved {
                url: url.to_owned(),
                reason: "empty message name".to_owned(),
            });
        }
        self.find_message_by_name(name)
            .ok_or_else(|| Error::Unresolved {
                url: url.to_owned(),
                reason: "not found".to_owned(),
            })
    }
}

impl TypeResolver for DescriptorPool {
    fn find_message_by_name(&self, name: &str) -> Option<MessageDescriptor> {
        self.get_message_by_name(name)
    }
}

use super::strip::LedStrip;
use crate::protocol::layout;

/// Name announced in discovery replies when none is configured.
pub const DEFAULT_DEVICE_NAME: &str = "My Favorite Device";

/// Stable identity of this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Numeric identifier; CONTROL frames addressed elsewhere are dropped.
    pub device_id: u32,
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(device_id: u32, name: impl Into<String>) -> Self {
        Self {
            device_id,
            name: name.into(),
        }
    }

    /// Discovery reply payload: `IAH-{id}-{correlation}-{name}`, ids as eight
    /// upper-case hex digits.
    ///
    /// # Examples
    /// ```
    /// use qlp_core::DeviceIdentity;
    ///
    /// let identity = DeviceIdentity::new(0x00C0FFEE, "Desk");
    /// assert_eq!(identity.discovery_reply(0x1A2B), "IAH-00C0FFEE-00001A2B-Desk");
    /// ```
    pub fn discovery_reply(&self, correlation: u32) -> String {
        format!(
            "{}-{:08X}-{:08X}-{}",
            layout::DISCOVERY_REPLY_PREFIX,
            self.device_id,
            correlation,
            self.name
        )
    }
}

/// Everything the dispatcher may mutate. Owned by the service, lent to the
/// dispatcher for one datagram at a time.
#[derive(Debug)]
pub struct DeviceState<S: LedStrip> {
    pub identity: DeviceIdentity,
    pub strip: S,
}

impl<S: LedStrip> DeviceState<S> {
    pub fn new(identity: DeviceIdentity, strip: S) -> Self {
        Self { identity, strip }
    }
}

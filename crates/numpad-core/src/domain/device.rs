//! Device identity and recognition.
//!
//! The host can have any number of serial ports.  Each enumerated USB serial
//! port is described by a [`DeviceInfo`]; a [`RecognitionInfo`] describes a
//! keypad model by its USB vendor and product id.  A port belongs to us when
//! [`DeviceInfo::matches`] one of the entries in [`RecognitionInfo::whitelist`].

use serde::{Deserialize, Serialize};

/// Product id that matches any product of the vendor.
pub const ANY_PRODUCT: &str = "*";

/// One serial port as reported by the platform enumerator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceInfo {
    /// OS port name, e.g. `"COM5"` or `"/dev/ttyACM0"`.
    pub port_name: String,
    /// USB vendor id as four hex digits.
    pub vendor_id: String,
    /// USB product id as four hex digits.
    pub product_id: String,
    /// Human-readable description, when the platform provides one.
    pub caption: String,
}

impl DeviceInfo {
    pub fn new(
        port_name: impl Into<String>,
        vendor_id: impl Into<String>,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            port_name: port_name.into(),
            vendor_id: vendor_id.into(),
            product_id: product_id.into(),
            caption: String::new(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Returns `true` when this port carries the vendor and product `entry`
    /// describes.
    ///
    /// Comparison is case-insensitive and ignores surrounding whitespace.  An
    /// entry whose product id is `"*"` matches every product of the vendor.
    pub fn matches(&self, entry: &RecognitionInfo) -> bool {
        if !id_eq(&self.vendor_id, &entry.vendor_id) {
            return false;
        }
        entry.product_id.trim() == ANY_PRODUCT || id_eq(&self.product_id, &entry.product_id)
    }
}

fn id_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// USB identity of a supported keypad model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecognitionInfo {
    pub vendor_id: String,
    pub product_id: String,
}

impl RecognitionInfo {
    pub fn new(vendor_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            product_id: product_id.into(),
        }
    }

    /// Number pad, board revision 2024-03-23.
    pub fn np_20240323() -> Self {
        Self::new("8857", "0323")
    }

    /// Every supported model, in scan order.
    pub fn whitelist() -> Vec<Self> {
        vec![Self::np_20240323()]
    }
}

//! # Delivery Router and Channel Adapters
//!
//! Every outbound message is validated once, then offered to the channel's
//! primary adapter and, if that adapter reports a retryable failure, to its
//! fallback. Each provider call runs under the configured send timeout.

pub mod adapter;
pub mod providers;
pub mod router;
pub mod validation;

pub use adapter::{AdapterError, AdapterErrorKind, ChannelAdapter, DeliveryReceipt, OutboundMessage};
pub use providers::{EmailApiAdapter, SmsGatewayAdapter, WhatsAppCloudAdapter};
pub use router::{DeliveryError, DeliveryResult, DeliveryRouter};
pub use validation::{normalize_phone, validate_email, ContentPolicy, ValidationError};

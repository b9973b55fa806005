//! Asynchronous delivery pipeline for pushlite.
//!
//! Jobs admitted by the HTTP gateway are placed on a [`DeliveryQueue`], drained
//! by dispatcher workers that call a [`PushMessageSender`], and the resulting
//! [`DeliveryOutcome`] is reported through the [`CallbackNotifier`].

pub mod callback_notifier;
pub mod delivery_queue;
pub mod delivery_stats;
pub mod dispatcher;
pub mod image_resolver;
pub mod message_sender;
pub mod push_contract;

pub use callback_notifier::*;
pub use delivery_queue::*;
pub use delivery_stats::*;
pub use dispatcher::*;
pub use image_resolver::*;
pub use message_sender::*;
pub use push_contract::*;

//! In-process event bus.
//!
//! A thin wrapper over a tokio broadcast channel. Services publish after their
//! unit of work has committed; publishing with no live subscriber returns an
//! error that callers ignore with `.ok()`.

use kiosk_types::KioskEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<KioskEvent>,
}

impl EventBus {
	/// Creates a bus whose subscribers lag after `capacity` unread events.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
		self.sender.subscribe()
	}

	pub fn publish(
		&self,
		event: KioskEvent,
	) -> Result<(), broadcast::error::SendError<KioskEvent>> {
		self.sender.send(event).map(|_| ())
	}
}

//! Single authoritative in-memory copy of the loaded wallet.
//!
//! Backed by a `tokio::sync::watch` channel: writers swap the whole state, readers either
//! peek at the current value or subscribe and receive every later swap.

use futures::Stream;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::wallet::model::{WalletPayload, Wrapper};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WalletState {
	#[default]
	Unloaded,
	/// Fetched from the backend but not yet decrypted.
	PartiallyLoaded(Arc<WalletPayload>),
	/// Decrypted and decoded.
	FullyLoaded(Arc<Wrapper>),
}

impl WalletState {
	pub fn wrapper(&self) -> Option<Arc<Wrapper>> {
		match self {
			WalletState::FullyLoaded(wrapper) => Some(wrapper.clone()),
			_ => None,
		}
	}

	pub fn is_fully_loaded(&self) -> bool {
		matches!(self, WalletState::FullyLoaded(_))
	}
}

pub struct WalletHolder {
	sender: watch::Sender<WalletState>,
}

impl WalletHolder {
	pub fn new() -> Self {
		Self {
			sender: watch::Sender::new(WalletState::Unloaded),
		}
	}

	/// Replace the current state and notify subscribers.
	pub fn hold(&self, state: WalletState) {
		debug!("Holder state -> {}", describe(&state));
		self.sender.send_replace(state);
	}

	pub fn hold_wrapper(&self, wrapper: Wrapper) -> Arc<Wrapper> {
		let wrapper = Arc::new(wrapper);
		self.hold(WalletState::FullyLoaded(wrapper.clone()));
		wrapper
	}

	pub fn current(&self) -> WalletState {
		self.sender.borrow().clone()
	}

	pub fn wrapper(&self) -> Option<Arc<Wrapper>> {
		self.sender.borrow().wrapper()
	}

	pub fn subscribe(&self) -> watch::Receiver<WalletState> {
		self.sender.subscribe()
	}

	/// Stream of states starting with the current one. Ends when the holder is dropped.
	pub fn updates(&self) -> impl Stream<Item = WalletState> + Send + 'static {
		let mut receiver = self.sender.subscribe();
		receiver.mark_changed();
		futures::stream::unfold(receiver, |mut receiver| async move {
			receiver.changed().await.ok()?;
			let state = receiver.borrow_and_update().clone();
			Some((state, receiver))
		})
	}

	pub fn release(&self) {
		self.hold(WalletState::Unloaded);
	}
}

impl Default for WalletHolder {
	fn default() -> Self {
		Self::new()
	}
}

fn describe(state: &WalletState) -> String {
	match state {
		WalletState::Unloaded => "unloaded".to_string(),
		WalletState::PartiallyLoaded(payload) => format!("partially loaded ({})", payload.guid),
		WalletState::FullyLoaded(wrapper) => format!(
			"fully loaded ({} v{}, checksum {})",
			wrapper.guid(),
			wrapper.version,
			wrapper.payload_checksum
		),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::wallet::model::{NativeWallet, WalletOptions};
	use futures::StreamExt;

	fn wrapper(version: u32) -> Wrapper {
		let wallet = NativeWallet {
			guid: "guid".to_string(),
			shared_key: "shared-key".to_string(),
			double_encrypted: false,
			double_password_hash: None,
			metadata_hd_node: None,
			options: WalletOptions::default(),
			hd_wallets: vec![],
			addresses: vec![],
			tx_notes: None,
			address_book: None,
		};
		Wrapper::new(5000, version, "checksum", "en", false, wallet)
	}

	#[test]
	fn starts_unloaded() {
		let holder = WalletHolder::new();
		assert_eq!(holder.current(), WalletState::Unloaded);
		assert!(holder.wrapper().is_none());
	}

	#[tokio::test]
	async fn late_subscriber_sees_latest_value_first() {
		let holder = WalletHolder::new();
		holder.hold_wrapper(wrapper(3));
		holder.hold_wrapper(wrapper(4));

		let mut updates = Box::pin(holder.updates());
		let first = updates.next().await.unwrap();
		assert_eq!(first.wrapper().unwrap().version, 4);

		holder.release();
		assert_eq!(updates.next().await.unwrap(), WalletState::Unloaded);
	}

	#[tokio::test]
	async fn stream_ends_when_holder_dropped() {
		let holder = WalletHolder::new();
		let mut updates = Box::pin(holder.updates());
		assert_eq!(updates.next().await, Some(WalletState::Unloaded));

		drop(holder);
		assert_eq!(updates.next().await, None);
	}

	#[test]
	fn hold_swaps_whole_value() {
		let holder = WalletHolder::new();
		let held = holder.hold_wrapper(wrapper(4));
		let mut receiver = holder.subscribe();

		holder.hold_wrapper(held.with_checksum("new"));
		assert!(receiver.has_changed().unwrap());
		assert_eq!(held.payload_checksum, "checksum");
		assert_eq!(holder.wrapper().unwrap().payload_checksum, "new");
	}
}

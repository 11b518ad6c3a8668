pub mod creator;
pub mod credentials;
pub mod holder;
pub mod model;
pub mod session;
pub mod sync;
pub mod types;

pub use creator::{WalletCreation, WalletCreator};
pub use credentials::{CredentialsError, CredentialsStore, InMemoryCredentialsStore};
pub use holder::{WalletHolder, WalletState};
pub use session::{SessionDependencies, WalletSession};
pub use sync::WalletSync;
pub use types::*;

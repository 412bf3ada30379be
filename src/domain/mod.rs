// Domain layer: presence entities, identifiers and the local store.

pub mod avatar;
pub mod errors;
pub mod ids;
pub mod presence;

pub use avatar::{Avatar, Direction, ProximityGroups, Space};
pub use errors::{PushError, SessionError};
pub use ids::{AvatarId, SpaceId, UserId};
pub use presence::PresenceStore;

use serde::Serialize;

use crate::codec::Collection;
use crate::remote::ChangeOp;

/// Notifications for whatever renders the local view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CoreEvent {
    /// A feed event changed one record.
    Changed {
        collection: Collection,
        op: ChangeOp,
        id: String,
    },
    /// A collection was replaced wholesale from the store.
    Reloaded { collection: Collection },
    /// The feed dropped; the view may be stale until `Resubscribed`.
    ChannelDisconnected { collection: Collection },
    Resubscribed { collection: Collection },
    /// The active board changed (after a switch or after its deletion).
    ActiveBoardChanged { board_id: String },
}

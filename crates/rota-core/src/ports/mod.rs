pub mod clock;
pub mod lock;
pub mod snapshot;
pub mod stores;

pub use clock::{Clock, FixedClock, SystemClock};
pub use lock::{DistributedLock, InProcessLock, LockAcquisition, LockHandle};
pub use snapshot::{InMemorySnapshotStore, SnapshotStore};
pub use stores::{AbsenceStore, AssignmentStore, BlockStore, PersonStore, TemplateStore};

#[cfg(any(test, feature = "testing"))]
pub use lock::MockDistributedLock;
#[cfg(any(test, feature = "testing"))]
pub use snapshot::MockSnapshotStore;
#[cfg(any(test, feature = "testing"))]
pub use stores::{
    MockAbsenceStore, MockAssignmentStore, MockBlockStore, MockPersonStore, MockTemplateStore,
};

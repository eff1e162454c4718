pub mod clock;
pub mod destination;
pub mod error;
pub mod ids;
pub mod push;
pub mod row;
pub mod table;

pub use clock::{Clock, SystemClock};
pub use destination::{ByteStream, Destination, DestinationTypeId, ResultType, Sink, SinkConsumer};
pub use error::{ErrorKind, ExecutionError, PushError};
pub use ids::{DestinationId, PushKey, TableId};
pub use push::{Condition, PushOutcome, PushRecord, PushSpec, PushStatus, ResourcePath};
pub use row::{CellValue, Row, RowStream};
pub use table::{ColumnMeta, ColumnType, TableRef};

mod io;
mod logging;
mod rwlock;

pub use io::{read_into, Decodeable, Encodeable, SmallFile};
pub use logging::init_logging;
pub use rwlock::HandyRwLock;

use thiserror::Error;

//link level failures. timeouts and missing acks are routine outcomes and
//live in ReadOutcome/SendOutcome instead; reconnecting is caller policy.
#[derive(Debug, Error)]
pub enum LinkError{
    #[error("could not open {port}: {source}")]
    Connect{
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("link closed")]
    Closed,
}

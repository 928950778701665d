//! The management client the interrogation engine talks through.
//!
//! Everything below this trait (connection setup, the request/response protocol, retries and
//! timeouts) is someone else's concern. The engine only looks at the bytes it gets back and at the
//! kind of failure it gets instead.

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The device answered, but refused or could not serve the request.
    ///
    /// Typical causes are unsupported properties, inaccessible memory or an object index past the
    /// end of the interface object table. These never end a session.
    #[error("device rejected the request: {0}")]
    Protocol(String),
    #[error("the connection to the device failed")]
    Transport(#[source] std::io::Error),
    #[error("interrupted while waiting for a response")]
    Interrupted,
}

impl ReadError {
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol(reason.into())
    }

    /// Whether the session may carry on with the next read after this failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Synchronous device management access.
///
/// Every call blocks until the device responds, the request fails or the wait is interrupted.
pub trait ManagementClient {
    /// Reads the 2-byte device descriptor type 0.
    fn read_device_descriptor(&mut self) -> Result<[u8; 2], ReadError>;

    /// Reads `count` elements of a property starting at element `start`.
    ///
    /// Element 0 holds the current number of elements as a 16-bit value. The returned elements
    /// are concatenated.
    fn read_property(
        &mut self,
        object_index: u8,
        pid: u8,
        start: u16,
        count: u8,
    ) -> Result<Vec<u8>, ReadError>;

    fn read_memory(&mut self, address: u16, length: u16) -> Result<Vec<u8>, ReadError>;

    fn read_analog_channel(&mut self, channel: u8, repeat: u8) -> Result<u32, ReadError>;

    /// Function property state read, addressed by object type and instance.
    ///
    /// Returns the response data with the return code already checked. An empty response means
    /// the device has nothing to report for this input.
    fn read_function_property_state(
        &mut self,
        object_type: u16,
        object_instance: u8,
        pid: u8,
        service: u8,
        input: &[u8],
    ) -> Result<Vec<u8>, ReadError>;
}

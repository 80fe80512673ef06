//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing the last modification of an entity.
#[derive(Clone, Copy, Debug)]
pub struct Modification;

/// Marker type describing an entity deletion.
#[derive(Clone, Copy, Debug)]
pub struct Deletion;

/// Marker type describing a start of some period.
#[derive(Clone, Copy, Debug)]
pub struct Start;

/// Marker type describing an end of some period.
#[derive(Clone, Copy, Debug)]
pub struct End;

/// Marker type describing a moment something is due.
#[derive(Clone, Copy, Debug)]
pub struct Due;

/// Marker type describing a moment something is settled.
#[derive(Clone, Copy, Debug)]
pub struct Settlement;

/// Marker type describing an expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// Marker type describing a moment something is sent.
#[derive(Clone, Copy, Debug)]
pub struct Sending;

//! GpuContextToken - proof of running on the GPU-owning thread.
//!
//! Atlas uploads and program recompiles take `&GpuContextToken`. The token
//! is `!Send` and `!Sync`, so it cannot leave the thread that created it,
//! while cache and scheduler code never needs one.

use std::marker::PhantomData;
use std::rc::Rc;

/// Marker for the thread that owns the GPU context.
#[derive(Debug)]
pub struct GpuContextToken {
	_not_send: PhantomData<Rc<()>>,
}

impl GpuContextToken {
	/// Create the token. Call on the thread that owns the GPU context, once
	/// the context is current.
	pub fn acquire() -> Self {
		Self {
			_not_send: PhantomData,
		}
	}
}

//! Probe shader programs and their preprocessor defines.
//!
//! Each [`ProbePass`] derives its define set from the config. When the config
//! changes, [`ProbePrograms::recompile`] hands only the passes whose defines
//! differ from the last successful compile to the [`ProgramBackend`].

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use super::GpuContextToken;
use crate::config::ClipmapConfig;
use crate::error::ProgramError;

/// Shader passes that read the probe atlases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProbePass {
	/// Writes traced probes into the atlases.
	ProbeUpdate,
	/// Samples probes during lighting.
	Composite,
	/// Visualises probe state.
	Debug,
}

impl ProbePass {
	pub const ALL: [ProbePass; 3] = [ProbePass::ProbeUpdate, ProbePass::Composite, ProbePass::Debug];

	pub fn name(self) -> &'static str {
		match self {
			ProbePass::ProbeUpdate => "probe_update",
			ProbePass::Composite => "composite",
			ProbePass::Debug => "probe_debug",
		}
	}

	/// Defines this pass is compiled with.
	pub fn defines(self, config: &ClipmapConfig) -> DefineSet {
		let mut defines = DefineSet::new();
		let [nx, ny, nz] = config.resolution;
		defines.set("PROBE_LEVELS", config.levels as i64);
		defines.set("PROBE_RES_X", nx as i64);
		defines.set("PROBE_RES_Y", ny as i64);
		defines.set("PROBE_RES_Z", nz as i64);
		defines.set("PROBE_OCT_TILE", config.oct_tile_size as i64);
		match self {
			// Not dispatched at all while disabled.
			ProbePass::ProbeUpdate => {}
			ProbePass::Composite => {
				defines.set("WORLD_PROBES", config.enabled as i64);
			}
			ProbePass::Debug => {
				defines.set("WORLD_PROBES", config.enabled as i64);
				defines.set("PROBE_DEBUG", 1);
			}
		}
		defines
	}

	#[inline]
	fn index(self) -> usize {
		self as usize
	}
}

impl fmt::Display for ProbePass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Ordered `NAME → value` preprocessor defines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DefineSet(BTreeMap<&'static str, i64>);

impl DefineSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&mut self, name: &'static str, value: i64) {
		self.0.insert(name, value);
	}

	pub fn get(&self, name: &str) -> Option<i64> {
		self.0.get(name).copied()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
		self.0.iter().map(|(k, v)| (*k, *v))
	}

	/// `#define NAME value` lines, sorted by name.
	pub fn to_preamble(&self) -> String {
		let mut out = String::new();
		for (name, value) in self.iter() {
			out.push_str(&format!("#define {name} {value}\n"));
		}
		out
	}
}

/// Renderer-side compiler for probe passes.
pub trait ProgramBackend {
	fn compile(&mut self, ctx: &GpuContextToken, pass: ProbePass, defines: &DefineSet) -> Result<(), ProgramError>;
}

/// Tracks which passes are out of date.
#[derive(Debug)]
pub struct ProbePrograms {
	/// Wanted define set per pass.
	target: [DefineSet; 3],
	/// Define set of the last successful compile per pass.
	compiled: [Option<DefineSet>; 3],
}

impl ProbePrograms {
	pub fn new(config: &ClipmapConfig) -> Self {
		Self {
			target: ProbePass::ALL.map(|p| p.defines(config)),
			compiled: [None, None, None],
		}
	}

	/// Update the wanted define sets. Returns the passes now out of date.
	pub fn set_config(&mut self, config: &ClipmapConfig) -> Vec<ProbePass> {
		self.target = ProbePass::ALL.map(|p| p.defines(config));
		self.stale_passes()
	}

	/// Force every pass to recompile.
	pub fn invalidate_all(&mut self) {
		self.compiled = [None, None, None];
	}

	pub fn defines(&self, pass: ProbePass) -> &DefineSet {
		&self.target[pass.index()]
	}

	pub fn stale_passes(&self) -> Vec<ProbePass> {
		ProbePass::ALL
			.into_iter()
			.filter(|p| self.compiled[p.index()].as_ref() != Some(&self.target[p.index()]))
			.collect()
	}

	/// Compile every stale pass. Returns how many compiled; the first failure
	/// stops the pass list and leaves the failed pass stale.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "probe_programs::recompile"))]
	pub fn recompile<B: ProgramBackend + ?Sized>(
		&mut self,
		ctx: &GpuContextToken,
		backend: &mut B,
	) -> Result<usize, ProgramError> {
		let mut compiled = 0;
		for pass in self.stale_passes() {
			let defines = &self.target[pass.index()];
			if let Err(err) = backend.compile(ctx, pass, defines) {
				warn!("[probe_programs] {pass} failed to compile: {err}");
				return Err(err);
			}
			debug!("[probe_programs] compiled {pass}");
			self.compiled[pass.index()] = Some(defines.clone());
			compiled += 1;
		}
		Ok(compiled)
	}
}

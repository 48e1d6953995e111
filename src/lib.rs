// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Track dotfiles as notes in an encrypted note store.
//!
//! notedot treats a note service as a place to stash configuration files.
//! Every tracked file below the home directory becomes a __note__ titled
//! after its file name, and every directory holding tracked files becomes a
//! __tag__ whose title spells out the directory path under a namespace root:
//!
//! ```text
//! ~/.config/nvim/init.lua  ->  tag "dotfiles.config.nvim", note "init.lua"
//! ~/.bashrc                ->  tag "dotfiles",             note ".bashrc"
//! ```
//!
//! The [`reconcile::Reconciler`] keeps both sides in step. It only ever
//! talks to the note service through [`store::RemoteStore`], and to the
//! local disk through [`fs::FileSystem`].

pub mod config;
pub mod fs;
pub mod model;
pub mod path;
pub mod reconcile;
pub mod store;

pub use reconcile::{Reconciler, ReconcileError};

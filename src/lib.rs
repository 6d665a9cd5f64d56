// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal shell environment bootstrapper.
//!
//! Shellstrap provisions a workstation once through [`install::Installer`],
//! and keeps the result current afterwards through [`loader::load`], which the
//! shell profile evaluates on every startup.
//!
//! # Self-Update Protocol
//!
//! The profile and the shell binary keep themselves current without ever
//! patching anything in place. See [`update`] for the protocol, and
//! [`update::cooldown`] for how often it may reach out to the network.
//!
//! # External Programs
//!
//! Nothing here talks to the package manager, the shell, or any other tool
//! directly. Every invocation goes through [`exec::CommandRunner`], so the
//! logic itself stays platform-neutral, and the defaults in [`config`] decide
//! which programs actually run.

pub mod config;
pub mod exec;
pub mod font;
pub mod install;
pub mod loader;
pub mod package;
pub mod path;
pub mod preflight;
pub mod profile;
pub mod readline;
pub mod step;
pub mod update;

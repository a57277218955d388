/*
 * This file is part of hwid.
 *
 * Copyright (C) 2026 hwid contributors
 *
 * hwid is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hwid is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hwid. If not, see <https://www.gnu.org/licenses/>.
 */

//! hwid - HWID encoder/decoder for device manufacturing lines
//!
//! Command line front end over `hwid-core`: encode a BOM, decode an HWID
//! string, evaluate component rules and check brand feature compliance.

pub mod cli;
pub mod commands;
pub mod logger;

pub use cli::Cli;
pub use commands::run_cli;

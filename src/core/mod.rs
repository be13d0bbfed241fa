// ─── packforge Core ───
// Turns a client modpack into a server pack, and keeps the hosted variant's
// artifacts and caches tidy.
//
// Architecture:
//   core/
//     config/     Configuration document and model
//     templates/  Bundled defaults and first-run bootstrap
//     copy/       Modpack copy and client-mod exclusion
//     version/    Minecraft, Forge and Fabric version lookups
//     maven/      Coordinates and maven-metadata parsing
//     downloader/ HTTP downloads with SHA-1 validation
//     loaders/    Forge and Fabric server installers, start scripts
//     packager    Zip archive of the finished pack root
//     pipeline/   Single-shot and hosted builds
//     artifact/   Registry of hosted builds
//     retention/  Cleanup, orphan sweep, manifest refresh, scheduling
//     state/      Shared state of the hosted service

pub mod artifact;
pub mod config;
pub mod copy;
pub mod downloader;
pub mod error;
pub mod http;
pub mod loaders;
pub mod maven;
pub mod packager;
pub mod paths;
pub mod pipeline;
pub mod retention;
pub mod state;
pub mod templates;
pub mod version;

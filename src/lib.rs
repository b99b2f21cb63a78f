//! # Avatar Resizer
//!
//! Fetch an image by URL and normalize it into a square avatar thumbnail
//! (128×128 by default), either directly or through a small in-process job
//! system with a fixed worker pool.
//!
//! # Architecture: Fetch → Resize → Deliver
//!
//! ```text
//! 1. Fetch    URL          →  ImageBuffer   (HTTP GET, decode to RGBA)
//! 2. Resize   ImageBuffer  →  ImageBuffer   (center crop, halve, final bicubic)
//! 3. Deliver  ImageBuffer  →  PNG           (job result, or written by a sink)
//! ```
//!
//! Steps 1 and 2 are one code path, [`process::fetch_and_resize`]. It is run
//! either inline by a caller ([`process::thumbnail_png`]) or by the workers of
//! a [`jobs::JobOrchestrator`], which records each job's lifecycle in a
//! [`jobs::JobStore`]:
//!
//! ```text
//! submit(url) ──▶ PENDING ──▶ PROCESSING ──┬──▶ COMPLETED (result buffer)
//!                                          └──▶ FAILED    (error message)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`fetch`] | `Fetcher` trait, URL validation, the reqwest-backed `HttpFetcher` |
//! | [`imaging`] | Immutable RGBA buffers and the crop/halve/bicubic resize algorithm |
//! | [`process`] | The fetch → resize pipeline shared by direct calls and job workers |
//! | [`jobs`] | Job ids and statuses, the shared `JobStore`, the worker-pool orchestrator |
//! | [`sink`] | `ResultSink` trait and the PNG-writing `DirectorySink` |
//! | [`naming`] | Collision-free output file names |
//! | [`config`] | `avatar-resizer.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting for direct and batch runs |
//!
//! # Design Decisions
//!
//! ## Progressive Halving
//!
//! A single bilinear or bicubic pass from a large photo straight to 128 px
//! skips most source pixels and aliases badly. The resizer instead halves the
//! cropped square with bilinear filtering while it is still at least twice the
//! target, then does one bicubic pass to the exact size. Each halving step
//! averages every source pixel, and the last step only has to cover a factor
//! below two. See [`imaging::resize`].
//!
//! ## Explicit Job Store
//!
//! There is no process-wide job registry. A [`jobs::JobStore`] is created by
//! the caller and handed to the orchestrator, so tests get a fresh store each
//! and an embedding can share one store between an orchestrator and its own
//! status endpoints.
//!
//! ## Bounded Worker Pool
//!
//! Submissions go into an unbounded queue; a fixed number of tokio tasks drain
//! it. Network I/O stays async while decoding and resampling run on tokio's
//! blocking pool. Shutdown closes the queue, waits up to a timeout for the
//! workers to finish, and aborts whatever is left.

pub mod config;
pub mod fetch;
pub mod imaging;
pub mod jobs;
pub mod naming;
pub mod output;
pub mod process;
pub mod sink;

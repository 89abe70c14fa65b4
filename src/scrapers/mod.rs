//! Wayback Machine scrapers.
//!
//! Scraping follows a two-phase pattern:
//!
//! 1. **Indexing** ([`cdx`]): list every capture of the handle's status URLs
//!    and merge them into the store
//! 2. **Fetching** ([`snapshot`]): fetch each pending capture's replay page and
//!    extract author and text, walking the markup with [`markup`]
//!
//! | Module | Endpoint | Response |
//! |--------|----------|----------|
//! | [`cdx`] | `/cdx/search/cdx?url=<site>/<handle>/status/*&output=json` | JSON rows |
//! | [`snapshot`] | `/web/<timestamp>/<original>` | HTML |

pub mod cdx;
pub mod markup;
pub mod snapshot;

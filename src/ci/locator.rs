//! Latest-build lookup for a tracked version.

use super::{CheckError, Transport};
use crate::config::{JobUrls, TrackedVersion};

/// Fetch the identifier of the newest run from the `latest-build.txt` pointer.
///
/// The identifier is used verbatim; its shape is not validated.
pub async fn latest_build(
    transport: &dyn Transport,
    urls: &JobUrls,
    version: &TrackedVersion,
) -> Result<String, CheckError> {
    let build = transport
        .get_text(&urls.latest_build())
        .await
        .map_err(|source| CheckError::LatestBuild {
            version: version.version.clone(),
            source,
        })?;
    tracing::debug!(version = %version.version, %build, "located latest build");
    Ok(build)
}

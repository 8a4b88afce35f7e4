// ABOUTME: Revision-tagged images of an app and their garbage collection.
// ABOUTME: Keeps the newest K tags plus the serving one; prunes artifacts, dangling layers, build cache.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::diagnostics::{Diagnostics, Warning};
use crate::naming::{self, LATEST_TAG};
use crate::runtime::{ComposeOps, ImageError, ImageOps};
use crate::types::{AppName, ImageRef, Revision};

/// Retention settings for one collection run.
#[derive(Debug, Clone, Copy)]
pub struct GcPolicy {
    /// Revision tags kept, the serving one included.
    pub keep_images: usize,
    /// Dangling layers and build cache younger than this survive.
    pub cache_limit: Duration,
}

/// Revisions that have a `mushak-<app>:<revision>` tag.
pub async fn revisions_with_images<R: ImageOps + ?Sized>(
    runtime: &R,
    app: &AppName,
) -> Result<BTreeSet<Revision>, ImageError> {
    let repository = naming::image_repository(app);
    let images = runtime.list_images(&repository).await?;

    Ok(images
        .iter()
        .flat_map(|image| image.tags.iter())
        .filter(|tag| tag.name() == repository)
        .filter_map(|tag| tag.tag())
        .filter(|tag| *tag != LATEST_TAG)
        .filter_map(|tag| Revision::new(tag).ok())
        .collect())
}

/// Give the serving revision its tags.
///
/// `source` is set when the primary ran an external image that has to be
/// re-tagged under the app's repository first.
pub async fn tag_release<R: ImageOps + ?Sized>(
    runtime: &R,
    app: &AppName,
    revision: &Revision,
    source: Option<&ImageRef>,
) -> Result<(), ImageError> {
    let image = naming::release_image(app, revision);
    if let Some(source) = source {
        runtime.tag_image(source, &image).await?;
    }
    runtime.tag_image(&image, &image.with_tag(LATEST_TAG)).await?;
    tracing::info!(image = %image, "tagged release");
    Ok(())
}

/// Remove old revision tags and per-release artifacts, then prune caches.
///
/// `history` lists the revisions recorded for this app, most recently
/// deployed first. Tags are retained in that order; creation time only
/// ranks tags the history does not know, since tags re-applied to one
/// external image all share its creation time. Only artifacts of recorded
/// revisions are removed, so another app whose name extends this one is
/// never touched. Every failure is a warning.
pub async fn collect_garbage<R: ImageOps + ComposeOps + ?Sized>(
    runtime: &R,
    app: &AppName,
    serving: &Revision,
    history: &[Revision],
    policy: GcPolicy,
    diag: &mut Diagnostics,
) {
    let repository = naming::image_repository(app);
    let rank = |tag: &ImageRef| {
        tag.tag()
            .and_then(|t| history.iter().position(|r| r.as_str() == t))
    };

    match runtime.list_images(&repository).await {
        Ok(images) => {
            let mut tagged: Vec<_> = images
                .iter()
                .flat_map(|image| image.tags.iter().map(move |tag| (tag, image.created)))
                .filter(|(tag, _)| tag.name() == repository)
                .filter(|(tag, _)| tag.tag().is_some_and(|t| t != LATEST_TAG))
                .collect();
            tagged.sort_by(|a, b| match (rank(a.0), rank(b.0)) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => b.1.cmp(&a.1),
            });

            for (tag, _) in tagged.into_iter().skip(policy.keep_images) {
                if tag.tag() == Some(serving.as_str()) {
                    continue;
                }
                match runtime.remove_image(tag, false).await {
                    Ok(()) => tracing::debug!(image = %tag, "removed old release image"),
                    Err(e) => diag.warn(Warning::image_gc(format!(
                        "could not remove {}: {}",
                        tag, e
                    ))),
                }
            }
        }
        Err(e) => diag.warn(Warning::image_gc(format!(
            "could not list images of {}: {}",
            repository, e
        ))),
    }

    let artifacts = format!("{}*", naming::app_prefix(app));
    match runtime.list_images(&artifacts).await {
        Ok(images) => {
            for tag in images.iter().flat_map(|image| image.tags.iter()) {
                let Some(revision) = naming::revision_from_name(app, tag.name()) else {
                    continue;
                };
                if &revision == serving || !history.contains(&revision) {
                    continue;
                }
                if let Err(e) = runtime.remove_image(tag, false).await {
                    diag.warn(Warning::image_gc(format!("could not remove {}: {}", tag, e)));
                }
            }
        }
        Err(e) => diag.warn(Warning::image_gc(format!(
            "could not list build artifacts of {}: {}",
            app, e
        ))),
    }

    if let Err(e) = runtime.prune_dangling(policy.cache_limit).await {
        diag.warn(Warning::image_gc(format!("dangling image prune failed: {}", e)));
    }
    if let Err(e) = runtime.prune_build_cache(policy.cache_limit).await {
        diag.warn(Warning::image_gc(format!("build cache prune failed: {}", e)));
    }
}

//! Page chrome: the "Add from DevOps" toolbar button and the maintenance
//! banner removal.

use crate::app::PageAction;
use crate::errors::TimecardError;
use crate::page::{Element, ElementSpec};
use crate::poll::Poll;
use crate::selector::{Selectors, Target};
use tracing::{debug, info};

/// Host button styling, so ours blends into the toolbar.
const BUTTON_CLASSES: [&str; 6] = [
    "BaseButtonStyles_styles_base__jvi3ds0",
    "BaseButtonStyles_styles_sizes_sm__jvi3ds2d",
    "BaseButtonStyles_styles_variants_outlined_base__jvi3dso",
    "BaseButtonStyles_styles_styled__jvi3ds1",
    "BaseButtonStyles_styles_styledOutline__jvi3ds2",
    "BaseButtonStyles_styles_variants_outlined_pseudohover__jvi3dsv",
];

fn button_spec() -> ElementSpec {
    let marker = Target::DevopsButton.marker_class().unwrap_or("devops-btn");
    BUTTON_CLASSES
        .iter()
        .fold(ElementSpec::new("button"), |spec, class| spec.class(class))
        .class(marker)
        .attr("style", "border-radius: 5px; font-weight: 600")
        .text("Add from DevOps")
        .action(PageAction::OpenImportDialog.as_str())
}

/// Put the button first in `toolbar` unless it is already there.
pub async fn add_button(toolbar: &Element) -> Result<Option<Element>, TimecardError> {
    for selector in Target::DevopsButton.selectors() {
        if toolbar.query(selector).await?.is_some() {
            debug!("toolbar button already present");
            return Ok(None);
        }
    }
    let first = toolbar.first_child().await?;
    let button = toolbar.insert_child(first.as_ref(), &button_spec()).await?;
    info!("Added DevOps toolbar button");
    Ok(Some(button))
}

/// Wait for the header toolbar, then add the button.
pub async fn inject_toolbar_button(
    selectors: &Selectors,
    poll: Poll,
) -> Result<Option<Element>, TimecardError> {
    let toolbar = poll
        .until(|| async move { selectors.query(Target::HeaderToolbar).await.ok().flatten() })
        .await;
    match toolbar {
        Some(toolbar) => add_button(&toolbar).await,
        None => {
            debug!("header toolbar never appeared");
            Ok(None)
        }
    }
}

/// Wait for the host's banner and remove it. True when one was removed.
pub async fn remove_banner(selectors: &Selectors, poll: Poll) -> Result<bool, TimecardError> {
    let banner = poll
        .until(|| async move { selectors.query(Target::Banner).await.ok().flatten() })
        .await;
    let Some(banner) = banner else {
        return Ok(false);
    };
    banner.remove().await?;
    debug!("removed banner");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;
    use std::sync::Arc;
    use std::time::Duration;

    fn poll() -> Poll {
        Poll::new(Duration::ZERO, 3)
    }

    #[tokio::test]
    async fn button_goes_first_once() {
        let page = Arc::new(FakePage::default());
        let toolbar = page.add_toolbar();
        let selectors = Selectors::new(page.clone());

        let button = inject_toolbar_button(&selectors, poll()).await.unwrap().unwrap();
        assert!(inject_toolbar_button(&selectors, poll()).await.unwrap().is_none());
        assert_eq!(page.count(".devops-btn"), 1);
        assert_eq!(page.children_of(toolbar)[0], button.id());
        assert_eq!(
            page.attr_of(button.id(), "data-timecard-action").as_deref(),
            Some("open_import_dialog")
        );
    }

    #[tokio::test]
    async fn missing_toolbar_gives_up() {
        let page = Arc::new(FakePage::default());
        let selectors = Selectors::new(page.clone());
        assert!(inject_toolbar_button(&selectors, poll()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn banner_is_removed() {
        let page = Arc::new(FakePage::default());
        let banner = page.add_banner();
        let selectors = Selectors::new(page.clone());
        assert!(remove_banner(&selectors, poll()).await.unwrap());
        assert!(!page.is_attached(banner));
        assert!(!remove_banner(&selectors, poll()).await.unwrap());
    }
}

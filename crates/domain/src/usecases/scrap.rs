//! Streaming export of historical posts
//!
//! The read lock is taken once to obtain the scraper's stream and then once
//! per item. Nothing is held between items, so a consumer may stop at any
//! point and a writer only waits for the item in flight.

use futures::StreamExt;
use futures::stream::BoxStream;
use time::OffsetDateTime;

use crate::error::FaceError;
use crate::model::{PostData, PostId, ScrapedPost, Submission};
use crate::usecases::face::Face;
use crate::usecases::state::State;

impl Face {
    /// Stream `(id, content, score)` triples for historical posts, in the
    /// order the scraper produces them.
    ///
    /// Posts the processor cannot translate are skipped and do not count
    /// toward `limit`. A scoring failure ends the stream with that error.
    pub fn scrap(
        &self,
        limit: Option<usize>,
        before: Option<OffsetDateTime>,
        after: Option<OffsetDateTime>,
    ) -> BoxStream<'_, Result<ScrapedPost, FaceError>> {
        let stream = async_stream::stream! {
            tracing::info!(limit = ?limit, before = ?before, after = ?after, "Scraping posts");

            let mut source = match self.state.read().await {
                Ok(state) => state.scraper.scrap(
                    state.client.clone(),
                    state.subreddit.clone(),
                    before,
                    after,
                ),
                Err(error) => {
                    yield Err(error);
                    return;
                }
            };

            let mut emitted = 0usize;
            let mut skipped = 0usize;

            while limit.is_none_or(|limit| emitted < limit) {
                let submission = match source.next().await {
                    Some(Ok(submission)) => submission,
                    Some(Err(error)) => {
                        tracing::error!(error = %error, "Scraper failed");
                        yield Err(error.into());
                        return;
                    }
                    None => break,
                };

                let outcome = match self.state.read().await {
                    Ok(state) => evaluate(&state, &submission).await,
                    Err(error) => Err(error),
                };

                match outcome {
                    Ok(Some(post)) => {
                        emitted += 1;
                        tracing::debug!(post_id = %post.id, score = post.score, "Scraped post");
                        yield Ok(post);
                    }
                    Ok(None) => skipped += 1,
                    Err(error) => {
                        tracing::error!(
                            native_id = %submission.id,
                            error = %error,
                            "Aborting scrap"
                        );
                        yield Err(error);
                        return;
                    }
                }
            }

            tracing::info!(emitted, skipped, "Scraping finished");
        };

        Box::pin(stream)
    }
}

/// Score and translate one submission; `None` when it cannot be translated
async fn evaluate(
    state: &State,
    submission: &Submission,
) -> Result<Option<ScrapedPost>, FaceError> {
    let id = PostId::from_native_id(&submission.id)?;
    let score = state.score(submission).await?;

    let content = match PostData::from_submission(submission) {
        Ok(data) => state.processor.to_external(&data).await,
        Err(error) => Err(error),
    };

    match content {
        Ok(content) => Ok(Some(ScrapedPost { id, content, score })),
        Err(error) => {
            tracing::debug!(
                native_id = %submission.id,
                error = %error,
                "Skipping post that cannot be translated"
            );
            Ok(None)
        }
    }
}

use std::time::Duration;

use tracing::info;

use crate::playback::PlaybackAdapter;
use crate::range::RangeModel;
use crate::source::SourceRef;
use crate::widget::{SessionId, VideoWidget};

/// One loaded video: its source, range state and widget binding.
///
/// A new session is created for every source change, so nothing derived
/// from a previous video can leak into the next one.
#[derive(Debug)]
pub struct Session<W> {
    id: SessionId,
    source: SourceRef,
    pub range: RangeModel,
    pub adapter: PlaybackAdapter<W>,
}

impl<W> Session<W>
where
    W: VideoWidget,
{
    pub fn new(
        id: SessionId,
        source: SourceRef,
        widget: W,
        poll_interval: Duration,
        looping: bool,
    ) -> Self {
        info!(session = id, video_id = %source.video_id, "session opened");
        Self {
            id,
            source,
            range: RangeModel::new(),
            adapter: PlaybackAdapter::new(widget, poll_interval, looping),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    /// Replaces the URL text of the loaded video; the player is untouched.
    pub fn retarget(&mut self, source: SourceRef) {
        debug_assert_eq!(source.video_id, self.source.video_id);
        self.source = source;
    }

    /// Splits the session into its range and adapter for one step.
    pub fn parts(&mut self) -> (&mut RangeModel, &mut PlaybackAdapter<W>) {
        (&mut self.range, &mut self.adapter)
    }

    pub fn close(mut self) {
        self.adapter.teardown();
        info!(session = self.id, video_id = %self.source.video_id, "session closed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Session;
    use crate::source::SourceRef;
    use crate::testing::{MockWidget, WidgetCall};
    use crate::widget::WidgetState;

    #[test]
    fn close_tears_down_the_widget() {
        let widget = MockWidget::with_duration(90.0);
        let handle = widget.clone();
        let source = SourceRef::parse("https://youtu.be/dQw4w9WgXcQ").expect("valid source");
        let mut session = Session::new(1, source, widget, Duration::from_millis(300), false);
        {
            let (range, adapter) = session.parts();
            adapter.on_ready(range);
            adapter.on_state_change(WidgetState::Playing);
        }

        session.close();

        assert_eq!(
            *handle.calls().lock().expect("lock calls"),
            vec![WidgetCall::Stop]
        );
    }
}

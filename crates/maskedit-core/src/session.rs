//! The editing session.
//!
//! [`EditSession`] ties the pieces together: it owns the uploaded image,
//! the edit history, the working prompt and mask, and the masking
//! canvas while masking is on. Front ends call one method per user
//! action and redraw from [`EditSession::view`].
//!
//! Generation is split in two so the core stays free of I/O:
//! [`EditSession::begin_generate`] validates and produces an
//! [`EditRequest`], the caller runs it against a service, and
//! [`EditSession::complete_generate`] folds the outcome back. While a
//! request is outstanding the session is busy and refuses every other
//! mutating action.

use serde::Serialize;

use crate::decode::{SourceImage, extension_for_mime_type};
use crate::history::{EditHistory, EditSnapshot};
use crate::mask::Mask;
use crate::masker::PixelDiffMasker;
use crate::prompts::surprise_prompt;
use crate::safety::{PhraseClassifier, SafetyClassifier};
use crate::service::{
    EditRequest, EditResult, EnhancedPrompts, ImageEditService, PromptEnhancer, ServiceError,
};
use crate::stroke::StrokeInput;
use crate::types::{Brush, Dimensions, EditorConfig, EditorError, Point, ValidationError};

/// File name used when the result's MIME type has no known extension.
const FALLBACK_EXTENSION: &str = "png";

/// The live canvas while masking is on.
#[derive(Debug, Clone, Default)]
pub struct MaskingCanvas {
    masker: PixelDiffMasker,
    stroke: StrokeInput,
}

impl MaskingCanvas {
    /// The masker behind the canvas.
    #[must_use]
    pub const fn masker(&self) -> &PixelDiffMasker {
        &self.masker
    }

    /// The stroke controller behind the canvas.
    #[must_use]
    pub const fn stroke(&self) -> &StrokeInput {
        &self.stroke
    }
}

/// A downloadable result image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Suggested file name.
    pub filename: String,
    /// MIME type of `bytes`.
    pub mime_type: String,
    /// Encoded image.
    pub bytes: Vec<u8>,
}

/// Everything a front end needs to render the controls.
///
/// Derived from session state on every call to [`EditSession::view`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// An image is uploaded.
    pub has_image: bool,
    /// Size of the uploaded image.
    pub image_dimensions: Option<Dimensions>,
    /// Undo is available.
    pub can_undo: bool,
    /// Redo is available.
    pub can_redo: bool,
    /// Generate is available.
    pub can_generate: bool,
    /// A request is outstanding.
    pub busy: bool,
    /// Masking mode is on.
    pub masking: bool,
    /// Current brush size in pixels.
    pub brush_size: u32,
    /// Working prompt.
    pub prompt: String,
    /// Working negative prompt.
    pub negative_prompt: String,
    /// A working mask is set.
    pub has_mask: bool,
    /// Text returned with the result at the cursor.
    pub current_result_text: Option<String>,
    /// The result at the cursor has an image.
    pub has_result_image: bool,
    /// Last error, as shown to the user.
    pub error: Option<String>,
    /// The last error can be recovered with enhance-and-retry.
    pub offer_enhance: bool,
    /// A result image can be downloaded.
    pub can_download: bool,
    /// Number of history snapshots.
    pub history_len: usize,
    /// History cursor.
    pub cursor: Option<usize>,
}

/// One user's editing session.
#[derive(Debug)]
pub struct EditSession {
    config: EditorConfig,
    classifier: Box<dyn SafetyClassifier>,
    source: Option<SourceImage>,
    history: EditHistory,
    prompt: String,
    negative_prompt: String,
    mask: Option<Mask>,
    brush: Brush,
    canvas: Option<MaskingCanvas>,
    busy: bool,
    error: Option<EditorError>,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditSession {
    /// A session with nothing uploaded.
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        Self {
            classifier: Box::new(PhraseClassifier::from_config(&config)),
            brush: Brush::clamped(config.brush_size),
            config,
            source: None,
            history: EditHistory::new(),
            prompt: String::new(),
            negative_prompt: String::new(),
            mask: None,
            canvas: None,
            busy: false,
            error: None,
        }
    }

    /// Replace the safety-filter classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl SafetyClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The uploaded image.
    #[must_use]
    pub const fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    /// The edit timeline.
    #[must_use]
    pub const fn history(&self) -> &EditHistory {
        &self.history
    }

    /// Working prompt.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Working negative prompt.
    #[must_use]
    pub fn negative_prompt(&self) -> &str {
        &self.negative_prompt
    }

    /// Working mask, sent with the next generation.
    #[must_use]
    pub const fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    /// Current brush.
    #[must_use]
    pub const fn brush(&self) -> Brush {
        self.brush
    }

    /// Whether a request is outstanding.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether masking mode is on.
    #[must_use]
    pub const fn is_masking(&self) -> bool {
        self.canvas.is_some()
    }

    /// The masking canvas, while masking is on.
    #[must_use]
    pub const fn canvas(&self) -> Option<&MaskingCanvas> {
        self.canvas.as_ref()
    }

    /// Last user-visible error.
    #[must_use]
    pub const fn error(&self) -> Option<&EditorError> {
        self.error.as_ref()
    }

    /// Result at the history cursor.
    #[must_use]
    pub fn current_result(&self) -> Option<&EditResult> {
        self.history
            .current()
            .and_then(|s| s.edit_result.as_ref())
    }

    /// Start a new session from uploaded bytes.
    ///
    /// On success the history holds one pristine snapshot, the prompts
    /// and mask are cleared and masking is off. If the bytes do not
    /// decode, the error is recorded and the previous image and history
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] while a request is outstanding and
    /// [`EditorError::Decode`] for undecodable input.
    pub fn upload(&mut self, bytes: Vec<u8>, mime_type: Option<&str>) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.canvas = None;

        let source = match SourceImage::decode(bytes, mime_type) {
            Ok(source) => source,
            Err(err) => {
                log::warn!("upload rejected: {err}");
                return Err(self.record(err.into()));
            }
        };
        log::info!(
            "uploaded {} image ({}x{})",
            source.mime_type(),
            source.dimensions().width,
            source.dimensions().height
        );

        self.history.init(EditSnapshot::pristine())?;
        self.source = Some(source);
        self.prompt.clear();
        self.negative_prompt.clear();
        self.mask = None;
        self.error = None;
        Ok(())
    }

    /// Start over: no image, empty history.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] while a request is outstanding.
    pub fn reset(&mut self) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.source = None;
        self.history.clear();
        self.prompt.clear();
        self.negative_prompt.clear();
        self.mask = None;
        self.canvas = None;
        self.error = None;
        log::info!("session reset");
        Ok(())
    }

    /// Replace the working prompt.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] while a request is outstanding.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.prompt = prompt.into();
        Ok(())
    }

    /// Replace the working negative prompt.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] while a request is outstanding.
    pub fn set_negative_prompt(&mut self, negative: impl Into<String>) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.negative_prompt = negative.into();
        Ok(())
    }

    /// Replace the working prompt with a surprise prompt picked by `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] while a request is outstanding.
    pub fn surprise(&mut self, seed: u64) -> Result<&str, EditorError> {
        self.set_prompt(surprise_prompt(seed))?;
        Ok(&self.prompt)
    }

    /// Set the brush size, clamped to the supported range.
    pub fn set_brush_size(&mut self, size_px: u32) -> Brush {
        self.brush = Brush::clamped(size_px);
        self.brush
    }

    /// Turn masking on or off. Returns whether masking is now on.
    ///
    /// Turning it on shows the uploaded image on a surface
    /// `container_width` pixels wide with the working mask painted in.
    /// Turning it off closes any open stroke and keeps the working mask.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] while a request is outstanding,
    /// [`ValidationError::MissingImage`] with nothing uploaded, and
    /// [`EditorError::Mask`] if the surface cannot be built.
    pub fn toggle_masking(&mut self, container_width: u32) -> Result<bool, EditorError> {
        self.ensure_idle()?;
        if self.canvas.is_some() {
            self.close_open_stroke(false)?;
            self.canvas = None;
            log::debug!("masking off");
            return Ok(false);
        }
        let source = self
            .source
            .as_ref()
            .ok_or(EditorError::Validation(ValidationError::MissingImage))?;

        // The source was decoded at upload, so the masker passes through
        // Decoding straight to Ready.
        let mut masker = PixelDiffMasker::new();
        masker.begin_decode();
        masker.load(source.pixels(), container_width)?;
        masker.restore(self.mask.as_ref())?;
        self.canvas = Some(MaskingCanvas {
            masker,
            stroke: StrokeInput::default(),
        });
        log::debug!("masking on");
        Ok(true)
    }

    /// Tell the canvas where its top-left corner is on screen.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::MaskingInactive`] when masking is off.
    pub fn set_surface_origin(&mut self, origin: Point) -> Result<(), EditorError> {
        let canvas = self.canvas.as_mut().ok_or(EditorError::MaskingInactive)?;
        canvas.stroke.set_origin(origin);
        Ok(())
    }

    /// Pointer pressed at `client`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`], [`EditorError::MaskingInactive`],
    /// or [`EditorError::Mask`] if the canvas is not ready.
    pub fn pointer_down(&mut self, client: Point) -> Result<(), EditorError> {
        self.ensure_idle()?;
        let canvas = self.canvas.as_mut().ok_or(EditorError::MaskingInactive)?;
        canvas.stroke.begin(client, &canvas.masker)?;
        Ok(())
    }

    /// Pointer moved to `client`; paints if a stroke is active.
    ///
    /// # Errors
    ///
    /// See [`Self::pointer_down`].
    pub fn pointer_move(&mut self, client: Point) -> Result<(), EditorError> {
        self.ensure_idle()?;
        let brush = self.brush;
        let canvas = self.canvas.as_mut().ok_or(EditorError::MaskingInactive)?;
        canvas.stroke.extend(client, &mut canvas.masker, brush)?;
        Ok(())
    }

    /// Pointer released: finish the stroke and update the working mask.
    ///
    /// # Errors
    ///
    /// See [`Self::pointer_down`].
    pub fn pointer_up(&mut self) -> Result<(), EditorError> {
        self.finish_stroke(false)
    }

    /// Pointer left the canvas or the touch was cancelled. Same as
    /// [`Self::pointer_up`].
    ///
    /// # Errors
    ///
    /// See [`Self::pointer_down`].
    pub fn pointer_leave(&mut self) -> Result<(), EditorError> {
        self.finish_stroke(true)
    }

    /// Remove the working mask and any paint on the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] while a request is outstanding.
    pub fn clear_mask(&mut self) -> Result<(), EditorError> {
        self.ensure_idle()?;
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.masker.clear()?;
        }
        self.mask = None;
        Ok(())
    }

    /// The canvas container changed width. An open stroke is closed
    /// first so no segment spans the old and new surface scales.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`], [`EditorError::MaskingInactive`],
    /// or [`EditorError::Mask`] if the new surface cannot be built.
    pub fn resize_canvas(&mut self, container_width: u32) -> Result<(), EditorError> {
        self.ensure_idle()?;
        if self.canvas.is_none() {
            return Err(EditorError::MaskingInactive);
        }
        self.close_open_stroke(false)?;
        let canvas = self.canvas.as_mut().ok_or(EditorError::MaskingInactive)?;
        canvas.masker.resize(container_width)?;
        Ok(())
    }

    /// Step back in history, restoring that point's prompts and mask.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] while a request is outstanding and
    /// [`EditorError::History`] when there is nothing to undo.
    pub fn undo(&mut self) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.close_open_stroke(false)?;
        let snapshot = self.history.undo()?.clone();
        self.apply_snapshot(snapshot)
    }

    /// Step forward in history, restoring that point's prompts and mask.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] while a request is outstanding and
    /// [`EditorError::History`] when there is nothing to redo.
    pub fn redo(&mut self) -> Result<(), EditorError> {
        self.ensure_idle()?;
        self.close_open_stroke(false)?;
        let snapshot = self.history.redo()?.clone();
        self.apply_snapshot(snapshot)
    }

    /// The result image at the history cursor, as a file.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NothingToDownload`] when the current point
    /// in history has no result image.
    pub fn download(&self) -> Result<Download, EditorError> {
        let image = self
            .current_result()
            .and_then(|r| r.image.as_ref())
            .ok_or(EditorError::NothingToDownload)?;
        let extension = extension_for_mime_type(image.mime_type()).unwrap_or(FALLBACK_EXTENSION);
        Ok(Download {
            filename: format!("{}.{extension}", self.config.download_stem),
            mime_type: image.mime_type().to_owned(),
            bytes: image.bytes().to_vec(),
        })
    }

    /// Validate the working state and start a generation.
    ///
    /// The request always carries the original upload, never a previous
    /// result. A stroke still in progress is closed first, so its paint
    /// is part of the mask sent. On success the session is busy until
    /// [`Self::complete_generate`].
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] if a request is already outstanding,
    /// and [`EditorError::Validation`] (also recorded as the session
    /// error) when no image is uploaded or the prompt is blank.
    pub fn begin_generate(&mut self) -> Result<EditRequest, EditorError> {
        self.ensure_idle()?;
        self.close_open_stroke(false)?;
        let image = match self.validate() {
            Ok(source) => source.to_data_uri(),
            Err(err) => {
                log::warn!("generate rejected: {err}");
                return Err(self.record(err.into()));
            }
        };

        let request = EditRequest {
            image,
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            mask: self.mask.clone(),
        };
        self.busy = true;
        self.error = None;
        log::info!(
            "generating: {:?} (masked: {})",
            request.prompt,
            request.mask.is_some()
        );
        Ok(request)
    }

    /// Fold the outcome of `request` back into the session.
    ///
    /// Clears the busy flag and turns masking off. Success commits a
    /// snapshot and returns the new history cursor; failure records the
    /// error and leaves history untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NoRequestInFlight`] if no request was
    /// started, otherwise the classified service failure.
    pub fn complete_generate(
        &mut self,
        request: EditRequest,
        outcome: Result<EditResult, ServiceError>,
    ) -> Result<usize, EditorError> {
        if !self.busy {
            return Err(EditorError::NoRequestInFlight);
        }
        self.busy = false;
        self.canvas = None;

        match outcome {
            Ok(result) => {
                let cursor = self.history.commit(EditSnapshot {
                    prompt: request.prompt,
                    negative_prompt: request.negative_prompt,
                    edit_result: Some(result),
                    mask: request.mask,
                })?;
                log::info!("edit committed at history index {cursor}");
                Ok(cursor)
            }
            Err(err) => {
                log::warn!("edit failed: {err}");
                let err = self.classify(err);
                Err(self.record(err))
            }
        }
    }

    /// Start a prompt enhancement. Returns the prompts to enhance.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Busy`] if a request is already outstanding.
    pub fn begin_enhance(&mut self) -> Result<(String, String), EditorError> {
        self.ensure_idle()?;
        self.busy = true;
        self.error = None;
        log::info!("enhancing prompt");
        Ok((self.prompt.clone(), self.negative_prompt.clone()))
    }

    /// Fold an enhancement outcome back: on success the working prompts
    /// are replaced.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NoRequestInFlight`] if no enhancement was
    /// started, otherwise the classified service failure.
    pub fn complete_enhance(
        &mut self,
        outcome: Result<EnhancedPrompts, ServiceError>,
    ) -> Result<(), EditorError> {
        if !self.busy {
            return Err(EditorError::NoRequestInFlight);
        }
        self.busy = false;
        match outcome {
            Ok(enhanced) => {
                log::info!("prompt enhanced: {:?}", enhanced.enhanced_prompt);
                self.prompt = enhanced.enhanced_prompt;
                self.negative_prompt = enhanced.enhanced_negative_prompt;
                Ok(())
            }
            Err(err) => {
                log::warn!("prompt enhancement failed: {err}");
                let err = self.classify(err);
                Err(self.record(err))
            }
        }
    }

    /// Run one generation against `service`.
    ///
    /// # Errors
    ///
    /// See [`Self::begin_generate`] and [`Self::complete_generate`].
    #[allow(clippy::future_not_send)] // driven on a single-threaded runtime
    pub async fn generate<S: ImageEditService>(&mut self, service: &S) -> Result<usize, EditorError> {
        let request = self.begin_generate()?;
        let outcome = service.edit(&request).await;
        self.complete_generate(request, outcome)
    }

    /// Enhance the working prompts, then generate with them. Generation
    /// is not attempted if enhancement fails.
    ///
    /// # Errors
    ///
    /// See [`Self::complete_enhance`] and [`Self::generate`].
    #[allow(clippy::future_not_send)] // driven on a single-threaded runtime
    pub async fn enhance_and_retry<E, S>(
        &mut self,
        enhancer: &E,
        service: &S,
    ) -> Result<usize, EditorError>
    where
        E: PromptEnhancer,
        S: ImageEditService,
    {
        let (prompt, negative) = self.begin_enhance()?;
        let outcome = enhancer.enhance(&prompt, &negative).await;
        self.complete_enhance(outcome)?;
        self.generate(service).await
    }

    /// Derive the control state from the session.
    #[must_use]
    pub fn view(&self) -> SessionView {
        let result = self.current_result();
        let has_image = self.source.is_some();
        let has_result_image = result.is_some_and(|r| r.image.is_some());
        SessionView {
            has_image,
            image_dimensions: self.source.as_ref().map(SourceImage::dimensions),
            can_undo: !self.busy && self.history.can_undo(),
            can_redo: !self.busy && self.history.can_redo(),
            can_generate: !self.busy && has_image && !self.prompt.trim().is_empty(),
            busy: self.busy,
            masking: self.canvas.is_some(),
            brush_size: self.brush.size_px(),
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            has_mask: self.mask.is_some(),
            current_result_text: result.and_then(|r| r.text.clone()),
            has_result_image,
            error: self.error.as_ref().map(ToString::to_string),
            offer_enhance: !self.busy && self.error.as_ref().is_some_and(EditorError::is_safety_filtered),
            can_download: has_result_image,
            history_len: self.history.len(),
            cursor: self.history.cursor(),
        }
    }

    fn finish_stroke(&mut self, cancelled: bool) -> Result<(), EditorError> {
        self.ensure_idle()?;
        if self.canvas.is_none() {
            return Err(EditorError::MaskingInactive);
        }
        self.close_open_stroke(cancelled)
    }

    /// Finalize the stroke in progress, if any, into the working mask.
    fn close_open_stroke(&mut self, cancelled: bool) -> Result<(), EditorError> {
        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(());
        };
        let finished = if cancelled {
            canvas.stroke.cancel(&canvas.masker)?
        } else {
            canvas.stroke.end(&canvas.masker)?
        };
        if let Some(mask) = finished {
            self.mask = (!mask.is_empty()).then_some(mask);
        }
        Ok(())
    }

    fn apply_snapshot(&mut self, snapshot: EditSnapshot) -> Result<(), EditorError> {
        self.prompt = snapshot.prompt;
        self.negative_prompt = snapshot.negative_prompt;
        self.mask = snapshot.mask;
        self.error = None;
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.masker.restore(self.mask.as_ref())?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<&SourceImage, ValidationError> {
        let source = self.source.as_ref().ok_or(ValidationError::MissingImage)?;
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::BlankPrompt);
        }
        Ok(source)
    }

    fn classify(&self, err: ServiceError) -> EditorError {
        if self.classifier.is_safety_filtered(err.message()) {
            EditorError::SafetyFiltered(err)
        } else {
            EditorError::Service(err)
        }
    }

    fn record(&mut self, err: EditorError) -> EditorError {
        self.error = Some(err.clone());
        err
    }

    fn ensure_idle(&self) -> Result<(), EditorError> {
        if self.busy {
            log::warn!("rejected: a request is in progress");
            return Err(EditorError::Busy);
        }
        Ok(())
    }
}

use anyhow::Result;

use super::result::Candidate;

/// A loaded detection model.
///
/// Backends receive packed RGB pixels and report candidates in frame pixel
/// coordinates. They do not threshold for display; that is the pipeline's job.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on one RGB image.
    fn infer(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Candidate>>;

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Produces a `DetectorBackend`. Loading may touch the network or disk
/// (fetching and caching weights); none of that happens inside the frame loop.
pub trait ModelLoader {
    fn name(&self) -> &'static str;

    fn load(&mut self) -> Result<Box<dyn DetectorBackend>>;
}

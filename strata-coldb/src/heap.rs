// String bodies keep their bytes in a heap of length-prefixed runs. Runs
// that already occur verbatim are shared instead of appended again.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    pub(crate) data: Vec<u8>,
}

// Beyond this the dedup search costs more than the bytes it saves.
const DEDUP_SEARCH_LIMIT: usize = 1 << 16;

impl Heap {
    pub(crate) fn add(&mut self, text: &str) -> u32 {
        let mut run = Vec::with_capacity(4 + text.len());
        run.extend_from_slice(&(text.len() as u32).to_le_bytes());
        run.extend_from_slice(text.as_bytes());
        if self.data.len() <= DEDUP_SEARCH_LIMIT {
            if let Some(pos) = memchr::memmem::find(&self.data, &run) {
                return pos as u32;
            }
        }
        let pos = self.data.len();
        self.data.extend_from_slice(&run);
        pos as u32
    }
}

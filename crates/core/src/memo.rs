/// A cached result tagged with the parameters that produced it.
///
/// Reads must present the current parameters; a mismatch discards the stale
/// entry, so no call site has to remember to compare parameters itself.
#[derive(Debug, Clone)]
pub struct Memoized<P, R> {
    entry: Option<(P, R)>,
}

impl<P, R> Default for Memoized<P, R> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<P: PartialEq, R> Memoized<P, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached result if it was produced with `params`.
    pub fn get(&self, params: &P) -> Option<&R> {
        match &self.entry {
            Some((cached, result)) if cached == params => Some(result),
            _ => None,
        }
    }

    /// Mutable access to the cached result; a stale entry is dropped.
    pub fn get_mut(&mut self, params: &P) -> Option<&mut R> {
        self.invalidate_unless(params);
        self.entry.as_mut().map(|(_, result)| result)
    }

    /// Removes and returns the cached result if it was produced with `params`.
    /// A stale entry is dropped and `None` is returned.
    pub fn take(&mut self, params: &P) -> Option<R> {
        self.invalidate_unless(params);
        self.entry.take().map(|(_, result)| result)
    }

    /// Whether an entry is cached for other parameters than `params`.
    pub fn is_stale(&self, params: &P) -> bool {
        matches!(&self.entry, Some((cached, _)) if cached != params)
    }

    pub fn store(&mut self, params: P, result: R) -> &mut R {
        let (_, result) = self.entry.insert((params, result));
        result
    }

    /// The cached result regardless of which parameters produced it.
    pub fn peek(&self) -> Option<&R> {
        self.entry.as_ref().map(|(_, result)| result)
    }

    pub fn peek_mut(&mut self) -> Option<&mut R> {
        self.entry.as_mut().map(|(_, result)| result)
    }

    pub fn params(&self) -> Option<&P> {
        self.entry.as_ref().map(|(params, _)| params)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    fn invalidate_unless(&mut self, params: &P) {
        if self.is_stale(params) {
            self.entry = None;
        }
    }
}

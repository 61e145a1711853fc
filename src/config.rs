/// Runtime knobs of an [`ExplicitAllocator`](crate::ExplicitAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Run the consistency checker after every mutating call and log the first
  /// violation found.
  pub audit: bool,
}

impl Config {
  pub const fn new() -> Self {
    Self {
      audit: cfg!(feature = "audit"),
    }
  }

  pub const fn with_audit(
    mut self,
    audit: bool,
  ) -> Self {
    self.audit = audit;
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}

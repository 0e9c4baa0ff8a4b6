//! Per-node side enablement for energy input and output.
//!
//! A [`SideMask`] records, for each of the six faces of a node, whether
//! energy may come in through it, go out through it, or both. Side queries
//! always walk [`Direction::ALL`] so iteration order is canonical.

use resonance_types::Direction;

/// Which faces of a node accept and emit energy.
///
/// The derived `enabled` table is recomputed on every write so it can
/// never disagree with the input and output tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SideMask {
    input: [bool; 6],
    output: [bool; 6],
    enabled: [bool; 6],
}

/// Read one slot of a six-entry side table.
fn slot(table: &[bool; 6], direction: Direction) -> bool {
    table.get(direction.index()).copied().unwrap_or(false)
}

/// Write one slot of a six-entry side table.
fn put(table: &mut [bool; 6], direction: Direction, value: bool) {
    if let Some(entry) = table.get_mut(direction.index()) {
        *entry = value;
    }
}

impl SideMask {
    /// A mask with every side disabled.
    pub const fn none() -> Self {
        Self {
            input: [false; 6],
            output: [false; 6],
            enabled: [false; 6],
        }
    }

    /// A mask with every side enabled for input and output.
    pub const fn all() -> Self {
        Self {
            input: [true; 6],
            output: [true; 6],
            enabled: [true; 6],
        }
    }

    /// Build a mask from explicit input and output side lists.
    pub fn from_sides(inputs: &[Direction], outputs: &[Direction]) -> Self {
        let mut mask = Self::none();
        for &direction in inputs {
            mask.set_input(direction, true);
        }
        for &direction in outputs {
            mask.set_output(direction, true);
        }
        mask
    }

    /// Set both the input and output flag for one side.
    pub fn set_side(&mut self, direction: Direction, input: bool, output: bool) {
        put(&mut self.input, direction, input);
        put(&mut self.output, direction, output);
        self.refresh(direction);
    }

    /// Set the input flag for one side.
    pub fn set_input(&mut self, direction: Direction, enabled: bool) {
        put(&mut self.input, direction, enabled);
        self.refresh(direction);
    }

    /// Set the output flag for one side.
    pub fn set_output(&mut self, direction: Direction, enabled: bool) {
        put(&mut self.output, direction, enabled);
        self.refresh(direction);
    }

    /// Enable every side for input and output.
    pub const fn enable_all(&mut self) {
        *self = Self::all();
    }

    /// Disable every side.
    pub const fn disable_all(&mut self) {
        *self = Self::none();
    }

    /// Whether energy may come in through `direction`.
    pub fn can_accept_from(&self, direction: Direction) -> bool {
        slot(&self.input, direction)
    }

    /// Whether energy may go out through `direction`.
    pub fn can_send_to(&self, direction: Direction) -> bool {
        slot(&self.output, direction)
    }

    /// Whether `direction` is enabled for either flow.
    pub fn is_enabled(&self, direction: Direction) -> bool {
        slot(&self.enabled, direction)
    }

    /// Input-enabled sides in canonical order.
    pub fn input_sides(&self) -> impl Iterator<Item = Direction> + use<> {
        let table = self.input;
        Direction::ALL.into_iter().filter(move |d| slot(&table, *d))
    }

    /// Output-enabled sides in canonical order.
    pub fn output_sides(&self) -> impl Iterator<Item = Direction> + use<> {
        let table = self.output;
        Direction::ALL.into_iter().filter(move |d| slot(&table, *d))
    }

    /// Sides enabled for either flow, in canonical order.
    pub fn enabled_sides(&self) -> impl Iterator<Item = Direction> + use<> {
        let table = self.enabled;
        Direction::ALL.into_iter().filter(move |d| slot(&table, *d))
    }

    /// Number of input-enabled sides.
    pub fn input_side_count(&self) -> usize {
        self.input.iter().filter(|&&on| on).count()
    }

    /// Number of output-enabled sides.
    pub fn output_side_count(&self) -> usize {
        self.output.iter().filter(|&&on| on).count()
    }

    /// Whether any side accepts input.
    pub fn has_input_sides(&self) -> bool {
        self.input.contains(&true)
    }

    /// Whether any side emits output.
    pub fn has_output_sides(&self) -> bool {
        self.output.contains(&true)
    }

    fn refresh(&mut self, direction: Direction) {
        let on = slot(&self.input, direction) || slot(&self.output, direction);
        put(&mut self.enabled, direction, on);
    }
}

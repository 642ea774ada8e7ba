use super::model::Directive;

/// Position of the scan relative to user blocks.
///
/// A block opens on a `user` line and closes on a blank line or the next
/// `user` line; end of input closes it implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockState<'a> {
    #[default]
    Outside,
    InsideUser(&'a str),
}

impl<'a> BlockState<'a> {
    /// State after consuming `directive`.
    pub fn advance(
        self,
        directive: &Directive<'a>,
    ) -> Self {
        match directive {
            Directive::User(name) => BlockState::InsideUser(name),
            Directive::Blank => BlockState::Outside,
            Directive::Topic { .. } | Directive::Other => self,
        }
    }

    pub fn is_inside(
        &self,
        username: &str,
    ) -> bool {
        matches!(self, BlockState::InsideUser(name) if *name == username)
    }
}

/// One classified line together with the state it was read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedLine<'a> {
    pub index: usize,
    pub raw: &'a str,
    pub directive: Directive<'a>,
    pub state: BlockState<'a>,
}

/// Walks `lines` top to bottom, yielding each line with the block state
/// *after* it was consumed, so a `user` line reports its own block.
pub fn scan<'a, S>(lines: &'a [S]) -> impl Iterator<Item = ScannedLine<'a>> + 'a
where
    S: AsRef<str>,
{
    let mut state = BlockState::Outside;
    lines.iter().enumerate().map(move |(index, raw)| {
        let raw = raw.as_ref();
        let directive = Directive::parse(raw);
        state = state.advance(&directive);
        ScannedLine {
            index,
            raw,
            directive,
            state,
        }
    })
}

/// Independent color and cache namespace for a stretch of audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderingStyle {
    Normal,
    Inactive,
    Selected,
    Primary,
}

impl RenderingStyle {
    pub const COUNT: usize = 4;

    pub const ALL: [RenderingStyle; 4] = [
        RenderingStyle::Normal,
        RenderingStyle::Inactive,
        RenderingStyle::Selected,
        RenderingStyle::Primary,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

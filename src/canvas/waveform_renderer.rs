use crate::canvas::colors::WaveformColors;
use crate::canvas::provider::{BitmapProvider, ProviderParams};
use crate::canvas::style::RenderingStyle;
use crate::canvas::surface::{Bitmap, Canvas};
use crate::error::RenderError;
use crate::types::Rect;
use audiotile_core::audio::SampleReader;

/// Min/max/mean-absolute reduction of the samples behind one column.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Envelope {
    pub min: f32,
    pub max: f32,
    pub average: f32,
}

impl Envelope {
    pub fn of(samples: &[f32]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut min_val = f32::MAX;
        let mut max_val = f32::MIN;
        let mut sum = 0.0;
        for &s in samples {
            min_val = min_val.min(s);
            max_val = max_val.max(s);
            sum += s.abs();
        }
        Self {
            min: min_val,
            max: max_val,
            average: sum / samples.len() as f32,
        }
    }
}

/// Row for an amplitude in a bitmap `height` pixels tall; `+1` is the top edge.
fn amplitude_to_row(value: f32, height: u32) -> i32 {
    let half = height as f32 / 2.0;
    (half - value * half).round() as i32
}

/// Min/max envelope backend. Holds no cache: every tile re-reads the source.
pub struct WaveformRenderer {
    params: ProviderParams,
    reader: SampleReader,
    /// Samples behind the tile being rendered.
    scratch: Vec<f32>,
    colors: [WaveformColors; RenderingStyle::COUNT],
    render_average: bool,
}

impl Default for WaveformRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformRenderer {
    pub fn new() -> Self {
        Self {
            params: ProviderParams::default(),
            reader: SampleReader::new(),
            scratch: Vec::new(),
            colors: RenderingStyle::ALL.map(WaveformColors::for_style),
            render_average: true,
        }
    }

    /// Toggle the mean-absolute envelope drawn inside the peaks.
    pub fn set_render_average(&mut self, enabled: bool) {
        self.render_average = enabled;
    }

    pub fn set_colors(&mut self, style: RenderingStyle, colors: WaveformColors) {
        self.colors[style.index()] = colors;
    }

    /// Envelopes of `columns` columns starting at absolute column `start_pixel`,
    /// before amplitude scaling. Columns past the end of the source read as silence.
    pub fn envelopes(&mut self, start_pixel: usize, columns: usize) -> Result<Vec<Envelope>, RenderError> {
        let Some(source) = self.params.source.as_deref() else {
            return Ok(vec![Envelope::default(); columns]);
        };
        if columns == 0 {
            return Ok(Vec::new());
        }

        let first = self.params.column_start(start_pixel);
        let (_, last) = self.params.column_range(start_pixel + columns - 1);
        self.scratch.resize((last - first) as usize, 0.0);
        self.reader.read_mono(source, first, &mut self.scratch)?;

        let params = &self.params;
        let scratch = &self.scratch;
        Ok((start_pixel..start_pixel + columns)
            .map(|x| {
                let (s, e) = params.column_range(x);
                Envelope::of(&scratch[(s - first) as usize..(e - first) as usize])
            })
            .collect())
    }
}

impl BitmapProvider for WaveformRenderer {
    fn params(&self) -> &ProviderParams {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ProviderParams {
        &mut self.params
    }

    fn render_tile(
        &mut self,
        bmp: &mut Bitmap,
        start_pixel: usize,
        style: RenderingStyle,
    ) -> Result<(), RenderError> {
        let envelopes = self.envelopes(start_pixel, bmp.width as usize)?;
        let colors = self.colors[style.index()];
        let scale = self.params.amplitude_scale;
        let height = bmp.height;

        bmp.fill(colors.background);
        bmp.fill_rect(Rect::new(0, height as i32 / 2, bmp.width as i32, 1), colors.zero_line);

        for (x, env) in envelopes.iter().enumerate() {
            let x = x as u32;
            let top = amplitude_to_row(env.max * scale, height);
            let bottom = amplitude_to_row(env.min * scale, height);
            bmp.draw_vline(x, top, bottom, colors.peak);

            if self.render_average {
                let avg_top = amplitude_to_row(env.average.min(env.max) * scale, height);
                let avg_bottom = amplitude_to_row((-env.average).max(env.min) * scale, height);
                bmp.draw_vline(x, avg_top, avg_bottom, colors.average);
            }
        }
        log::trace!("waveform tile at column {start_pixel} rendered");
        Ok(())
    }

    fn render_blank(&self, canvas: &mut dyn Canvas, rect: Rect, style: RenderingStyle) {
        let colors = &self.colors[style.index()];
        canvas.fill_rect(rect, colors.background);
        let zero = Rect::new(rect.x, rect.y + rect.height / 2, rect.width, 1);
        canvas.fill_rect(zero, colors.zero_line);
    }
}

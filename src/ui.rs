use crate::config::{PanelBinding, PanelView, Settings};

pub fn render_index(settings: &Settings) -> String {
    let mut charts = String::new();
    let mut stats = String::new();
    for binding in settings.endpoints.iter().flat_map(|endpoint| endpoint.panels.iter()) {
        match binding.view {
            PanelView::Categories { .. }
            | PanelView::Monthly { .. }
            | PanelView::IncomeVsExpenses { .. }
            | PanelView::NetSavings { .. } => {
                charts.push_str(&chart_card(binding));
            }
            _ => stats.push_str(&stat_card(binding)),
        }
    }

    INDEX_HTML
        .replace("{{STATS}}", &stats)
        .replace("{{CHARTS}}", &charts)
}

fn chart_card(binding: &PanelBinding) -> String {
    let target = escape_html(&binding.target);
    let title = escape_html(&binding.title);
    format!(
        r#"<div class="chart-card">
        <h2>{title}</h2>
        <svg id="{target}" data-panel viewBox="0 0 600 260" role="img" aria-label="{title}"></svg>
      </div>
      "#
    )
}

fn stat_card(binding: &PanelBinding) -> String {
    let target = escape_html(&binding.target);
    let title = escape_html(&binding.title);
    let extra = match binding.view {
        PanelView::CategorySummary => format!(
            r#"<span class="detail"><span id="{target}-count">--</span> categories</span>
        <span class="detail">Top: <span id="{target}-top">--</span> <span id="{target}-top-value">--</span> (<span id="{target}-top-share">--</span>)</span>"#
        ),
        PanelView::MonthlySummary => format!(
            r#"<span class="detail">Total <span id="{target}-total">--</span> over <span id="{target}-months">--</span> months</span>"#
        ),
        PanelView::SavingsHealth { .. } => format!(
            r#"<span class="detail">Savings rate <span id="{target}-rate">--</span></span>
        <table class="metrics">
          <tr><td>Total income (12 months)</td><td id="{target}-income">--</td></tr>
          <tr><td>Total expenses (12 months)</td><td id="{target}-expenses">--</td></tr>
          <tr><td>Total savings</td><td id="{target}-savings">--</td></tr>
          <tr><td>Avg monthly income</td><td id="{target}-avg-income">--</td></tr>
          <tr><td>Avg monthly expenses</td><td id="{target}-avg-expenses">--</td></tr>
        </table>"#
        ),
        _ => format!(r#"<span class="detail" id="{target}-value">--</span>"#),
    };
    format!(
        r#"<div class="stat">
        <span class="label">{title}</span>
        <span class="value" id="{target}" data-panel>--</span>
        {extra}
      </div>
      "#
    )
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Expense Dashboard</title>
  <style>
    :root {
      --bg-1: #f8f3e6;
      --bg-2: #f5d3a7;
      --ink: #2b2a28;
      --accent: #ff6b4a;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.86);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #ffe9d4 60%, #f9f2e9 100%);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(1080px, 100%);
      background: var(--card);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 36px;
      display: grid;
      gap: 28px;
    }

    header {
      display: flex;
      flex-wrap: wrap;
      align-items: center;
      justify-content: space-between;
      gap: 16px;
    }

    h1 {
      font-family: "Georgia", serif;
      font-weight: 600;
      font-size: clamp(2rem, 4vw, 2.6rem);
      margin: 0;
    }

    h2 {
      margin: 0 0 8px;
      font-size: 1.1rem;
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
      gap: 16px;
    }

    .charts {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(420px, 1fr));
      gap: 16px;
    }

    .stat,
    .chart-card {
      background: white;
      border-radius: 18px;
      padding: 18px;
      border: 1px solid rgba(47, 72, 88, 0.08);
      display: grid;
      gap: 8px;
    }

    .stat .label {
      font-size: 0.85rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #8b857d;
    }

    .stat .value {
      font-size: 1.7rem;
      font-weight: 600;
      color: var(--accent-2);
    }

    .stat .detail {
      color: #6b645d;
      font-size: 0.9rem;
    }

    .metrics {
      font-size: 0.85rem;
      color: #6b645d;
      border-collapse: collapse;
    }

    .metrics td:last-child {
      text-align: right;
      font-weight: 600;
      color: var(--ink);
    }

    svg {
      width: 100%;
      height: 260px;
      display: block;
    }

    .chart-grid {
      stroke: rgba(47, 72, 88, 0.12);
    }

    .chart-label {
      fill: #7a746d;
      font-size: 11px;
    }

    button {
      appearance: none;
      border: none;
      border-radius: 999px;
      padding: 10px 18px;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent-2);
      color: white;
    }

    .status {
      font-size: 0.95rem;
      color: #6b645d;
      min-height: 1.2em;
      display: flex;
      gap: 12px;
      align-items: center;
    }

    .status[data-type="error"] {
      color: #c63b2b;
    }

    .status[data-type="ok"] {
      color: #2d7a4b;
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Expense Dashboard</h1>
      <button id="refresh" type="button">Refresh</button>
    </header>

    <div class="status" id="status"><span id="status-text"></span></div>

    <section class="panel">
      {{STATS}}
    </section>

    <section class="charts">
      {{CHARTS}}
    </section>
  </main>

  <script>
    const statusEl = document.getElementById('status');
    const statusTextEl = document.getElementById('status-text');
    const refreshBtn = document.getElementById('refresh');
    const drawn = new Map();
    const NS = 'http://www.w3.org/2000/svg';

    const setStatus = (status) => {
      statusTextEl.textContent = status ? status.message : '';
      statusEl.dataset.type = status ? status.kind : '';
      const old = statusEl.querySelector('button');
      if (old) {
        old.remove();
      }
      if (status && status.retry) {
        const retry = document.createElement('button');
        retry.type = 'button';
        retry.textContent = 'Retry';
        retry.addEventListener('click', () => load());
        statusEl.appendChild(retry);
      }
    };

    const fmt = (value) => (Math.round(value * 100) / 100).toFixed(2);

    const esc = (raw) =>
      String(raw ?? '')
        .replace(/&/g, '&amp;')
        .replace(/</g, '&lt;')
        .replace(/>/g, '&gt;')
        .replace(/"/g, '&quot;')
        .replace(/'/g, '&#39;');

    const empty = (svg) => {
      svg.innerHTML = '<text class="chart-label" x="50%" y="50%" text-anchor="middle">No data yet</text>';
    };

    const drawPie = (svg, spec, hole) => {
      const total = spec.values.reduce((a, b) => a + b, 0);
      if (!total) {
        empty(svg);
        return;
      }
      const cx = 180;
      const cy = 130;
      const r = 110;
      let angle = -Math.PI / 2;
      let out = '';
      spec.values.forEach((value, i) => {
        const sweep = (value / total) * Math.PI * 2;
        const end = angle + sweep;
        const large = sweep > Math.PI ? 1 : 0;
        const x1 = cx + r * Math.cos(angle);
        const y1 = cy + r * Math.sin(angle);
        const x2 = cx + r * Math.cos(end - 1e-6);
        const y2 = cy + r * Math.sin(end - 1e-6);
        const label = esc(spec.labels[i]);
        const share = esc(spec.percentages[i]);
        const color = esc(spec.colors[i]);
        out += `<path d="M ${cx} ${cy} L ${x1} ${y1} A ${r} ${r} 0 ${large} 1 ${x2} ${y2} Z" fill="${color}" stroke="#fff" stroke-width="2"><title>${label}: ${fmt(value)} (${share})</title></path>`;
        out += `<rect x="330" y="${24 + i * 22}" width="12" height="12" fill="${color}" />`;
        out += `<text class="chart-label" x="350" y="${34 + i * 22}">${label} ${share}</text>`;
        angle = end;
      });
      if (hole) {
        out += `<circle cx="${cx}" cy="${cy}" r="${r * 0.55}" fill="#fff" />`;
      }
      svg.innerHTML = out;
    };

    const drawBars = (svg, spec, horizontal) => {
      const max = Math.max(...spec.values, 0);
      const min = Math.min(...spec.values, 0);
      const range = max - min || 1;
      const width = 600;
      const height = 260;
      const pad = 44;
      const n = spec.values.length;
      let out = '';
      spec.values.forEach((value, i) => {
        const color = esc(spec.colors[i % spec.colors.length]);
        const label = esc(spec.labels[i]);
        if (horizontal) {
          const band = (height - pad) / n;
          const span = width - pad * 3;
          const zero = pad * 2 + (span * -min) / range;
          const w = (span * Math.abs(value)) / range;
          const x = value < 0 ? zero - w : zero;
          out += `<rect x="${x}" y="${12 + i * band}" width="${w}" height="${band * 0.7}" fill="${color}"><title>${label}: ${fmt(value)}</title></rect>`;
          out += `<text class="chart-label" x="${pad * 2 - 6}" y="${12 + i * band + band * 0.45}" text-anchor="end">${label}</text>`;
        } else {
          const band = (width - pad * 2) / n;
          const span = height - pad * 2;
          const zero = pad + (span * max) / range;
          const h = (span * Math.abs(value)) / range;
          const y = value < 0 ? zero : zero - h;
          out += `<rect x="${pad + i * band + band * 0.15}" y="${y}" width="${band * 0.7}" height="${h}" fill="${color}"><title>${label}: ${fmt(value)}</title></rect>`;
          out += `<text class="chart-label" x="${pad + i * band + band / 2}" y="${height - pad + 16}" text-anchor="middle">${label}</text>`;
        }
      });
      if (min < 0 && !horizontal) {
        const zero = pad + ((height - pad * 2) * max) / range;
        out += `<line class="chart-grid" x1="${pad}" y1="${zero}" x2="${width - pad}" y2="${zero}" />`;
      }
      svg.innerHTML = out;
    };

    const drawLine = (svg, spec) => {
      const width = 600;
      const height = 260;
      const paddingX = 44;
      const paddingY = 34;
      const top = 24;
      const datasets = spec.series && spec.series.length
        ? spec.series
        : [{ label: '', values: spec.values, color: spec.colors[0] }];
      const all = datasets.flatMap((set) => set.values);
      const max = Math.max(...all, 0) || 1;
      const count = spec.labels.length;
      const xStep = count > 1 ? (width - paddingX * 2) / (count - 1) : 0;
      const scaleY = (height - top - paddingY) / max;
      const x = (i) => paddingX + i * xStep;
      const y = (value) => height - paddingY - value * scaleY;
      let grid = '';
      for (let i = 0; i <= 4; i += 1) {
        const value = (max * i) / 4;
        grid += `<line class="chart-grid" x1="${paddingX}" y1="${y(value)}" x2="${width - paddingX}" y2="${y(value)}" />`;
        grid += `<text class="chart-label" x="${paddingX - 8}" y="${y(value) + 4}" text-anchor="end">${Math.round(value)}</text>`;
      }
      const lines = datasets
        .map((set) => {
          const color = esc(set.color);
          const name = set.label ? `${esc(set.label)} ` : '';
          const path = set.values
            .map((value, i) => `${i === 0 ? 'M' : 'L'} ${x(i).toFixed(2)} ${y(value).toFixed(2)}`)
            .join(' ');
          const points = set.values
            .map((value, i) => `<circle cx="${x(i)}" cy="${y(value)}" r="4" fill="#fff" stroke="${color}" stroke-width="2"><title>${name}${esc(spec.labels[i])}: ${fmt(value)}</title></circle>`)
            .join('');
          return `<path d="${path}" fill="none" stroke="${color}" stroke-width="3" />${points}`;
        })
        .join('');
      const labels = spec.labels
        .map((label, i) => `<text class="chart-label" x="${x(i)}" y="${height - paddingY + 18}" text-anchor="middle">${esc(label)}</text>`)
        .join('');
      const legend = datasets
        .filter((set) => set.label)
        .map((set, i) => `<rect x="${paddingX + i * 110}" y="4" width="12" height="12" fill="${esc(set.color)}" /><text class="chart-label" x="${paddingX + i * 110 + 18}" y="14">${esc(set.label)}</text>`)
        .join('');
      svg.innerHTML = `${grid}${lines}${labels}${legend}`;
    };

    const drawChart = (chart) => {
      const svg = document.getElementById(chart.target);
      if (!svg) {
        return;
      }
      if (drawn.get(chart.target) === chart.id) {
        return;
      }
      drawn.set(chart.target, chart.id);
      const spec = chart.spec;
      if (!spec.values.length && !(spec.series && spec.series.length)) {
        empty(svg);
        return;
      }
      if (spec.kind === 'pie' || spec.kind === 'doughnut') {
        drawPie(svg, spec, spec.kind === 'doughnut');
      } else if (spec.kind === 'bar' || spec.kind === 'horizontal_bar') {
        drawBars(svg, spec, spec.kind === 'horizontal_bar');
      } else {
        drawLine(svg, spec);
      }
    };

    const load = async () => {
      const targets = Array.from(document.querySelectorAll('[data-panel]')).map((el) => el.id);
      refreshBtn.disabled = true;
      try {
        const res = await fetch(`/api/dashboard?targets=${encodeURIComponent(targets.join(','))}`);
        const view = await res.json();
        view.charts.forEach(drawChart);
        Object.entries(view.texts).forEach(([slot, text]) => {
          const el = document.getElementById(slot);
          if (el) {
            el.textContent = text;
          }
        });
        setStatus(view.status);
      } catch (err) {
        setStatus({ kind: 'error', message: 'Failed to load dashboard data. Please try again.', retry: true });
      } finally {
        refreshBtn.disabled = false;
      }
    };

    refreshBtn.addEventListener('click', () => load());
    document.addEventListener('DOMContentLoaded', () => load());
  </script>
</body>
</html>
"##;

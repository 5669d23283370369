//! REST endpoint handlers for the viewer API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Dashboard page |
//! | `GET` | `/api/status` | Simulation process status |
//! | `POST` | `/api/commands` | Submit one request envelope |

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::Json;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- dashboard
// ---------------------------------------------------------------------------

/// Serve the dashboard: a single page that connects to `/ws`, plots the
/// price feed, lists trades and offers the simulation controls.
pub async fn index() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// GET /api/status -- process status
// ---------------------------------------------------------------------------

/// Return the simulation process status.
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.process_status())
}

// ---------------------------------------------------------------------------
// POST /api/commands -- submit a request
// ---------------------------------------------------------------------------

/// Submit a request envelope, exactly as a `WebSocket` text frame would.
///
/// The body is read as text so that malformed JSON is reported in the
/// same `{error, status}` shape as every other rejection.
pub async fn post_command(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<impl IntoResponse, ObserverError> {
    state.dispatcher.handle_text(&body).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Market Simulation</title>
    <style>
        body {
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 960px;
            margin: 0 auto;
        }
        h1 { color: #58a6ff; margin-bottom: 0.25rem; }
        .subtitle { color: #8b949e; margin-top: 0; }
        .metric {
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }
        .metric .label { color: #8b949e; font-size: 0.85rem; }
        .metric .value { color: #58a6ff; font-size: 1.5rem; font-weight: bold; }
        button, select, input {
            background: #161b22;
            color: #c9d1d9;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 0.4rem 0.8rem;
            margin: 0.2rem;
            font-family: inherit;
        }
        button:hover { border-color: #58a6ff; }
        canvas { background: #161b22; border: 1px solid #30363d; border-radius: 6px; width: 100%; }
        #trades { list-style: none; padding: 0; max-height: 240px; overflow-y: auto; }
        #trades li { padding: 0.15rem 0; }
        .buy { color: #3fb950; }
        .sell { color: #f85149; }
        #error { color: #f85149; min-height: 1.2rem; }
        hr { border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }
    </style>
</head>
<body>
    <h1>Market Simulation</h1>
    <p class="subtitle">Live limit order book feed</p>

    <div>
        <select id="mode">
            <option value="moderate">moderate</option>
            <option value="volatile">volatile</option>
            <option value="very_volatile">very volatile</option>
            <option value="most_volatile">most volatile</option>
        </select>
        <input id="makers" type="number" min="0" value="5" title="market makers">
        <input id="fundamental" type="number" min="0" value="20" title="fundamental traders">
        <input id="momentum" type="number" min="0" value="10" title="momentum traders">
        <input id="noise" type="number" min="0" value="50" title="noise traders">
        <button id="start">Start</button>
        <button data-event="pause_simulation">Pause</button>
        <button data-event="resume_simulation">Resume</button>
        <button data-event="stop_simulation">Stop</button>
    </div>
    <div>
        <select id="side"><option value="buy">buy</option><option value="sell">sell</option></select>
        <input id="quantity" type="number" min="1" value="10" title="quantity">
        <input id="price" type="number" min="0" step="0.01" value="100" title="price">
        <button id="order">Place order</button>
        <select id="scenario">
            <option value="normal">normal</option>
            <option value="pump">pump</option>
            <option value="squeeze">squeeze</option>
        </select>
        <button id="set-scenario">Set scenario</button>
    </div>
    <p id="error"></p>

    <div>
        <div class="metric"><div class="label">Price</div><div class="value" id="price-value">-</div></div>
        <div class="metric"><div class="label">Volume</div><div class="value" id="volume-value">-</div></div>
        <div class="metric"><div class="label">Spread</div><div class="value" id="spread-value">-</div></div>
        <div class="metric"><div class="label">Liquidity</div><div class="value" id="liquidity-value">-</div></div>
        <div class="metric"><div class="label">Sentiment</div><div class="value" id="sentiment-value">-</div></div>
    </div>

    <canvas id="chart" width="900" height="240"></canvas>

    <hr>
    <h2>Trades</h2>
    <ul id="trades"></ul>

    <script>
        const prices = [];
        const $ = (id) => document.getElementById(id);
        const ws = new WebSocket(`${location.protocol === 'https:' ? 'wss' : 'ws'}://${location.host}/ws`);
        const send = (event, data = {}) => ws.send(JSON.stringify({ event, data }));

        function draw() {
            const canvas = $('chart');
            const ctx = canvas.getContext('2d');
            ctx.clearRect(0, 0, canvas.width, canvas.height);
            if (prices.length < 2) return;
            const lo = Math.min(...prices), hi = Math.max(...prices);
            const span = hi - lo || 1;
            ctx.strokeStyle = '#58a6ff';
            ctx.beginPath();
            prices.forEach((p, i) => {
                const x = (i / (prices.length - 1)) * canvas.width;
                const y = canvas.height - ((p - lo) / span) * (canvas.height - 10) - 5;
                i === 0 ? ctx.moveTo(x, y) : ctx.lineTo(x, y);
            });
            ctx.stroke();
        }

        ws.onmessage = (msg) => {
            const { event, data } = JSON.parse(msg.data);
            switch (event) {
                case 'market_data':
                    $('price-value').textContent = data.price.toFixed(2);
                    $('volume-value').textContent = data.volume;
                    prices.push(data.price);
                    if (prices.length > 500) prices.shift();
                    draw();
                    break;
                case 'trade_log': {
                    const li = document.createElement('li');
                    li.className = String(data.side).toLowerCase() === 'buy' ? 'buy' : 'sell';
                    li.textContent = `${data.agent} ${data.side} ${data.qty} @ ${data.price.toFixed(2)}`;
                    $('trades').prepend(li);
                    while ($('trades').children.length > 200) $('trades').lastChild.remove();
                    break;
                }
                case 'market_metrics':
                    $('spread-value').textContent = data.spread.toFixed(3);
                    $('liquidity-value').textContent = data.liquidity;
                    break;
                case 'server_sentiment':
                    $('sentiment-value').textContent = data.join(' ');
                    break;
                case 'error':
                    $('error').textContent = data.message;
                    break;
            }
        };

        $('start').onclick = () => {
            $('error').textContent = '';
            prices.length = 0;
            send('start_simulation', {
                mode: $('mode').value,
                makers: Number($('makers').value),
                fundamental: Number($('fundamental').value),
                momentum: Number($('momentum').value),
                noise: Number($('noise').value),
            });
        };
        document.querySelectorAll('button[data-event]').forEach((b) => {
            b.onclick = () => send(b.dataset.event);
        });
        $('order').onclick = () => send('place_order', {
            side: $('side').value,
            quantity: Number($('quantity').value),
            price: Number($('price').value),
        });
        $('set-scenario').onclick = () => send('set_scenario', { type: $('scenario').value });
    </script>
</body>
</html>"#;

//! Single-page UI
//!
//! Each upload panel's `accept` filter is filled in from
//! [`MediaKind::allowed_extensions`] when the page is rendered.

use crate::media::MediaKind;

const TEMPLATE: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>GenAI Studio</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; color: #222; }
  h1 { font-size: 1.6rem; }
  select, input, textarea, button { font: inherit; }
  textarea { width: 100%; min-height: 4rem; }
  .panel { display: none; margin-top: 1rem; }
  .panel.active { display: block; }
  .turn { padding: .5rem .75rem; margin: .35rem 0; border-radius: 6px; white-space: pre-wrap; }
  .turn.user { background: #e8f0fe; }
  .turn.model { background: #f1f3f4; }
  .result { white-space: pre-wrap; background: #f8f8f8; padding: .75rem; border-radius: 6px; margin-top: 1rem; }
  .error { color: #b00020; }
  .row { margin: .5rem 0; }
  .preview img, .preview video { max-width: 100%; max-height: 360px; }
  .preview audio { width: 100%; }
</style>
</head>
<body>
<h1>GenAI Studio</h1>
<label for="mode">Mode</label>
<select id="mode">
  <option value="text">Text Conversation</option>
  <option value="image">Image Analysis</option>
  <option value="audio">Audio Analysis</option>
  <option value="video">Video Analysis</option>
</select>

<section id="panel-text" class="panel active">
  <div id="history"></div>
  <form id="chat-form">
    <div class="row"><textarea id="chat-input" placeholder="Ask anything"></textarea></div>
    <button type="submit">Send</button>
  </form>
  <p id="chat-error" class="error"></p>
</section>

<section id="panel-image" class="panel" data-kind="image">
  <form class="analyze-form">
    <div class="row"><input type="file" name="file" accept="{{accept:image}}"></div>
    <div class="row"><textarea name="prompt" placeholder="What would you like to know about this image?"></textarea></div>
    <button type="submit">Analyze image</button>
  </form>
  <div class="preview"></div>
  <div class="output"></div>
</section>

<section id="panel-audio" class="panel" data-kind="audio">
  <form class="analyze-form">
    <div class="row"><input type="file" name="file" accept="{{accept:audio}}"></div>
    <div class="row"><textarea name="prompt" placeholder="What would you like to know about this audio?"></textarea></div>
    <button type="submit">Analyze audio</button>
  </form>
  <div class="preview"></div>
  <div class="output"></div>
</section>

<section id="panel-video" class="panel" data-kind="video">
  <form class="analyze-form">
    <div class="row"><input type="file" name="file" accept="{{accept:video}}"></div>
    <div class="row"><textarea name="prompt" placeholder="What would you like to know about this video?"></textarea></div>
    <button type="submit">Analyze video</button>
  </form>
  <div class="preview"></div>
  <div class="output"></div>
</section>

<script>
const modeSelect = document.getElementById('mode');
modeSelect.addEventListener('change', () => {
  document.querySelectorAll('.panel').forEach(p => p.classList.remove('active'));
  document.getElementById('panel-' + modeSelect.value).classList.add('active');
});

function errorText(body, status) {
  if (body && body.error) return body.error.message;
  return 'Request failed (' + status + ')';
}

async function callJson(url, options) {
  const res = await fetch(url, options);
  const body = res.status === 204 ? null : await res.json().catch(() => null);
  if (!res.ok) {
    const err = new Error(errorText(body, res.status));
    err.kind = body && body.error ? body.error.kind : null;
    throw err;
  }
  return body;
}

let sessionId = null;
const history = document.getElementById('history');

function renderTurns(turns) {
  history.innerHTML = '';
  for (const turn of turns) {
    const div = document.createElement('div');
    div.className = 'turn ' + turn.role;
    div.textContent = turn.text;
    history.appendChild(div);
  }
}

async function ensureSession() {
  if (sessionId) return;
  const view = await callJson('/api/chat/sessions', { method: 'POST' });
  sessionId = view.session_id;
  renderTurns(view.turns);
}

document.getElementById('chat-form').addEventListener('submit', async (event) => {
  event.preventDefault();
  const input = document.getElementById('chat-input');
  const chatError = document.getElementById('chat-error');
  chatError.textContent = '';
  try {
    await ensureSession();
    await callJson('/api/chat/sessions/' + sessionId + '/messages', {
      method: 'POST',
      headers: { 'content-type': 'application/json' },
      body: JSON.stringify({ message: input.value }),
    });
    const view = await callJson('/api/chat/sessions/' + sessionId);
    renderTurns(view.turns);
    input.value = '';
  } catch (err) {
    if (err.kind === 'session_not_found') {
      // Expired on the server; start over on the next send.
      sessionId = null;
      chatError.textContent = 'Your conversation expired. A new one has been started, please send again.';
      ensureSession().catch(e => { chatError.textContent = e.message; });
    } else {
      chatError.textContent = err.message;
    }
  }
});

document.querySelectorAll('.analyze-form').forEach(form => {
  const panel = form.closest('.panel');
  const preview = panel.querySelector('.preview');
  let previewUrl = null;
  form.querySelector('input[type=file]').addEventListener('change', (event) => {
    if (previewUrl) URL.revokeObjectURL(previewUrl);
    previewUrl = null;
    preview.innerHTML = '';
    const file = event.target.files[0];
    if (!file) return;
    previewUrl = URL.createObjectURL(file);
    const tag = { image: 'img', audio: 'audio', video: 'video' }[panel.dataset.kind];
    const media = document.createElement(tag);
    media.src = previewUrl;
    if (tag !== 'img') media.controls = true;
    preview.appendChild(media);
  });

  form.addEventListener('submit', async (event) => {
    event.preventDefault();
    const output = panel.querySelector('.output');
    const button = form.querySelector('button');
    output.className = 'output result';
    output.textContent = panel.dataset.kind === 'video'
      ? 'Uploading and waiting for processing...'
      : 'Analyzing...';
    button.disabled = true;
    try {
      const result = await callJson('/api/analyze/' + panel.dataset.kind, {
        method: 'POST',
        body: new FormData(form),
      });
      output.textContent = result.text;
    } catch (err) {
      output.className = 'output result error';
      output.textContent = err.message;
    } finally {
      button.disabled = false;
    }
  });
});

ensureSession().catch(err => {
  document.getElementById('chat-error').textContent = err.message;
});
</script>
</body>
</html>
"##;

/// Comma-separated `accept` value for a file input, e.g. `.mp3,.wav`.
pub fn accept_filter(kind: MediaKind) -> String {
    kind.allowed_extensions()
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// The page with every panel's upload filter filled in.
pub fn render() -> String {
    MediaKind::ALL.iter().fold(TEMPLATE.to_string(), |html, kind| {
        html.replace(&format!("{{{{accept:{kind}}}}}"), &accept_filter(*kind))
    })
}

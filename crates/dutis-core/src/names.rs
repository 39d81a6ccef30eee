//! Human-readable labels for common type identifiers.

pub fn friendly_name(uti: &str) -> &str {
    match uti {
        "public.mpeg-4" => "MPEG-4 Video",
        "public.mpeg" => "MPEG Video",
        "public.avi" => "AVI Video",
        "com.apple.quicktime-movie" => "QuickTime Movie",
        "public.mp3" => "MP3 Audio",
        "com.microsoft.waveform-audio" => "WAV Audio",
        "public.aiff-audio" => "AIFF Audio",
        "com.apple.m4a-audio" => "M4A Audio",
        "public.audio" => "Audio",
        "public.jpeg" => "JPEG Image",
        "public.png" => "PNG Image",
        "com.compuserve.gif" => "GIF Image",
        "public.svg-image" => "SVG Image",
        "public.tiff" => "TIFF Image",
        "public.heic" => "HEIC Image",
        "public.plain-text" => "Plain Text",
        "public.text" => "Text",
        "public.html" => "HTML Document",
        "public.xml" => "XML Document",
        "public.json" => "JSON Document",
        "com.adobe.pdf" => "PDF Document",
        "com.microsoft.word.doc" | "org.openxmlformats.wordprocessingml.document" => "Word Document",
        "com.microsoft.excel.xls" | "org.openxmlformats.spreadsheetml.sheet" => "Excel Spreadsheet",
        "com.microsoft.powerpoint.ppt" | "org.openxmlformats.presentationml.presentation" => "PowerPoint Presentation",
        "public.rtf" => "Rich Text Document",
        "net.daringfireball.markdown" => "Markdown Document",
        "public.python-script" => "Python Source",
        "com.netscape.javascript-source" => "JavaScript Source",
        "public.ruby-script" => "Ruby Source",
        "public.shell-script" => "Shell Script",
        "public.c-source" => "C Source",
        "public.c-header" => "C Header",
        "public.c-plus-plus-source" => "C++ Source",
        "public.swift-source" => "Swift Source",
        "public.zip-archive" => "ZIP Archive",
        "org.gnu.gnu-zip-archive" => "Gzip Archive",
        "public.tar-archive" => "Tar Archive",
        "org.7-zip.7-zip-archive" => "7-Zip Archive",
        _ => uti,
    }
}
